use serde::Serialize;
use std::fmt;

/// 2x2 confusion matrix; rows are true classes, columns predicted classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[bool], y_pred: &[bool]) -> Self {
        let mut m = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_positive += 1,
                (true, false) => m.false_negative += 1,
                (true, true) => m.true_positive += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[[{:>5} {:>5}]", self.true_negative, self.false_positive)?;
        write!(f, " [{:>5} {:>5}]]", self.false_negative, self.true_positive)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Per-class precision/recall/F1 plus accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Index 0 is the "down" class, index 1 "up".
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(m: &ConfusionMatrix) -> Self {
        let down = ClassMetrics::new(m.true_negative, m.false_negative, m.false_positive);
        let up = ClassMetrics::new(m.true_positive, m.false_positive, m.false_negative);
        let total = m.total();

        let accuracy = if total == 0 {
            0.0
        } else {
            (m.true_negative + m.true_positive) as f64 / total as f64
        };

        let macro_avg = ClassMetrics {
            precision: (down.precision + up.precision) / 2.0,
            recall: (down.recall + up.recall) / 2.0,
            f1: (down.f1 + up.f1) / 2.0,
            support: total,
        };

        let weight = |a: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (a * down.support as f64 + b * up.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(down.precision, up.precision),
            recall: weight(down.recall, up.recall),
            f1: weight(down.f1, up.f1),
            support: total,
        };

        Self {
            classes: [down, up],
            accuracy,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (label, m) in ["0", "1"].iter().zip(self.classes.iter()) {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (label, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
