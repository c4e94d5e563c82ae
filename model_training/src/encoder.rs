use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ModelError;

/// Maps category strings to `0..n` in ascending lexical order of the fitted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Result<usize, ModelError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| ModelError::UnseenLabel(value.to_string()))
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}
