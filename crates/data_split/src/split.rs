//! 分区算法
//!
//! Two-way split into `trainval` and `test`. With a stratify column every
//! class gets a test quota proportional to its size (largest remainder),
//! then rows inside the class are drawn with the seeded RNG.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use contracts::{ContractError, NO_STRATIFY};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Stratification policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stratify {
    /// Plain random partition
    None,
    /// Preserve class frequencies of this column
    Column(String),
}

impl Stratify {
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Column(c) => Some(c),
        }
    }
}

impl FromStr for Stratify {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == NO_STRATIFY {
            Ok(Self::None)
        } else if s.is_empty() {
            Err(ContractError::config_validation(
                "stratify_by",
                format!("must be a column name or \"{NO_STRATIFY}\""),
            ))
        } else {
            Ok(Self::Column(s.to_string()))
        }
    }
}

impl fmt::Display for Stratify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column().unwrap_or(NO_STRATIFY))
    }
}

/// Split parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOptions {
    pub test_size: f64,
    /// Accepted and recorded; the nested train/val split is not performed
    pub val_size: f64,
    pub random_seed: u64,
    pub stratify: Stratify,
}

impl SplitOptions {
    pub fn new(
        test_size: f64,
        val_size: f64,
        random_seed: u64,
        stratify: Stratify,
    ) -> Result<Self, ContractError> {
        check_fraction("test_size", test_size)?;
        check_fraction("val_size", val_size)?;
        Ok(Self {
            test_size,
            val_size,
            random_seed,
            stratify,
        })
    }
}

fn check_fraction(field: &str, value: f64) -> Result<(), ContractError> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field,
            format!("{field} must be in [0, 1), got {value}"),
        ))
    }
}

/// Output partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    TrainVal,
    Test,
}

impl Partition {
    /// Emission order
    pub const ALL: [Partition; 2] = [Partition::TrainVal, Partition::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrainVal => "trainval",
            Self::Test => "test",
        }
    }

    /// Published artifact name, `<partition>_data.csv`
    pub fn artifact_name(self) -> String {
        format!("{}_data.csv", self.as_str())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row indices per partition, each ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    trainval: Vec<usize>,
    test: Vec<usize>,
}

impl PartitionSet {
    pub fn get(&self, partition: Partition) -> &[usize] {
        match partition {
            Partition::TrainVal => &self.trainval,
            Partition::Test => &self.test,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Partition, &[usize])> {
        Partition::ALL.into_iter().map(|p| (p, self.get(p)))
    }

    pub fn total(&self) -> usize {
        self.trainval.len() + self.test.len()
    }
}

/// Number of test rows: `ceil(test_size * n)`, capped at `n`
///
/// A tiny epsilon absorbs products like `0.7 * 10 = 7.000000000000001`.
pub fn test_count(n: usize, test_size: f64) -> usize {
    let raw = (test_size * n as f64 - 1e-9).ceil();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(n)
    }
}

/// Partition `n` rows
///
/// `labels` holds the stratify column's value per row and must have `n`
/// entries when given.
pub fn split_indices(n: usize, labels: Option<&[&str]>, options: &SplitOptions) -> PartitionSet {
    let n_test = test_count(n, options.test_size);
    let mut rng = StdRng::seed_from_u64(options.random_seed);

    let mut test = match labels {
        None => {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            order.truncate(n_test);
            order
        }
        Some(labels) => stratified_test_rows(labels, n_test, &mut rng),
    };
    test.sort_unstable();

    let mut in_test = vec![false; n];
    for &i in &test {
        in_test[i] = true;
    }
    let trainval = (0..n).filter(|&i| !in_test[i]).collect();

    PartitionSet { trainval, test }
}

fn stratified_test_rows(labels: &[&str], n_test: usize, rng: &mut StdRng) -> Vec<usize> {
    let n = labels.len();
    let mut classes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(i);
    }

    let quotas = class_quotas(&classes, n, n_test);

    let mut test = Vec::with_capacity(n_test);
    for ((_, rows), quota) in classes.iter_mut().zip(quotas) {
        rows.shuffle(rng);
        test.extend_from_slice(&rows[..quota]);
    }
    test
}

/// Largest remainder apportionment of `n_test` over classes (sorted order)
fn class_quotas(classes: &BTreeMap<&str, Vec<usize>>, n: usize, n_test: usize) -> Vec<usize> {
    if n == 0 {
        return vec![0; classes.len()];
    }

    // share = n_test * size / n, kept exact as (floor, remainder)
    let mut quotas = Vec::with_capacity(classes.len());
    let mut remainders = Vec::with_capacity(classes.len());
    for (pos, rows) in classes.values().enumerate() {
        let numerator = n_test * rows.len();
        quotas.push(numerator / n);
        remainders.push((numerator % n, rows.len(), pos));
    }

    let assigned: usize = quotas.iter().sum();
    let mut leftover = n_test - assigned;

    // larger remainder first, then larger class, then class order
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    for &(remainder, _, pos) in &remainders {
        if leftover == 0 {
            break;
        }
        if remainder > 0 {
            quotas[pos] += 1;
            leftover -= 1;
        }
    }
    quotas
}
