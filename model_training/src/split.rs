use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Train/test partition of row indices keeping each label's share in both
/// halves. The same seed always produces the same split.
pub fn stratified_split(labels: &[bool], test_ratio: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(labels.len()),
        test: Vec::new(),
    };

    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let n = members.len();
        let mut n_test = (n as f64 * test_ratio).round() as usize;
        // a class with two or more rows lands on both sides
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        }

        split.test.extend_from_slice(&members[..n_test]);
        split.train.extend_from_slice(&members[n_test..]);
    }

    split.train.sort_unstable();
    split.test.sort_unstable();
    split
}
