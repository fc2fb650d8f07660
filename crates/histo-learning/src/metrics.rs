//! Confusion matrices and accuracy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{LearningError, Result};

/// Counts of (predicted, true) label pairs.
///
/// Rows are predicted levels, columns are true levels, both in `levels` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfusionMatrix")]
pub struct ConfusionMatrix {
    levels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

#[derive(Deserialize)]
struct RawConfusionMatrix {
    levels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl TryFrom<RawConfusionMatrix> for ConfusionMatrix {
    type Error = LearningError;

    fn try_from(raw: RawConfusionMatrix) -> Result<Self> {
        let n = raw.levels.len();
        if raw.counts.len() != n || raw.counts.iter().any(|row| row.len() != n) {
            return Err(LearningError::InvalidArtifact(format!(
                "confusion matrix over {} level(s) must be {} x {}",
                n, n, n
            )));
        }
        Ok(Self {
            levels: raw.levels,
            counts: raw.counts,
        })
    }
}

impl ConfusionMatrix {
    /// Tabulate `predicted` against `truth` over `levels`.
    ///
    /// # Errors
    ///
    /// Fails if the sequences differ in length or a value is not in `levels`.
    pub fn from_values<P, T>(levels: Vec<String>, predicted: &[P], truth: &[T]) -> Result<Self>
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        if predicted.len() != truth.len() {
            return Err(LearningError::InvalidDimension(format!(
                "{} prediction(s) for {} true label(s)",
                predicted.len(),
                truth.len()
            )));
        }

        let index = |value: &str| -> Result<usize> {
            levels.iter().position(|l| l == value).ok_or_else(|| {
                LearningError::InvalidDimension(format!(
                    "label '{}' is not among the confusion matrix levels",
                    value
                ))
            })
        };

        let mut counts = vec![vec![0; levels.len()]; levels.len()];
        for (p, t) in predicted.iter().zip(truth) {
            counts[index(p.as_ref())?][index(t.as_ref())?] += 1;
        }

        Ok(Self { levels, counts })
    }

    /// Sorted union of two level sets.
    pub fn union_levels(a: &[String], b: &[String]) -> Vec<String> {
        a.iter()
            .chain(b)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Count for `(predicted, truth)` level indices.
    pub fn count(&self, predicted: usize, truth: usize) -> usize {
        self.counts[predicted][truth]
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.levels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Share of samples on the diagonal; `0.0` for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Largest single cell, used to scale heat map colours.
    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .levels
            .iter()
            .map(|l| l.len())
            .chain(std::iter::once("pred \\ true".len()))
            .max()
            .unwrap_or(0);

        write!(f, "{:>width$}", "pred \\ true")?;
        for level in &self.levels {
            write!(f, "  {:>width$}", level)?;
        }
        writeln!(f)?;

        for (level, row) in self.levels.iter().zip(&self.counts) {
            write!(f, "{:>width$}", level)?;
            for count in row {
                write!(f, "  {:>width$}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn levels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rows_are_predicted_columns_are_true() {
        let cm = ConfusionMatrix::from_values(
            levels(&["A", "B"]),
            &["A", "A", "B", "A"],
            &["A", "B", "B", "A"],
        )
        .unwrap();

        assert_eq!(cm.counts(), &[vec![2, 1], vec![0, 1]]);
        assert_eq!(cm.count(0, 1), 1);
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.accuracy(), 0.75);
    }

    #[test]
    fn test_deserialize_rejects_ragged_counts() {
        let json = r#"{"levels": ["A", "B"], "counts": [[1, 0], [2]]}"#;
        let err = serde_json::from_str::<ConfusionMatrix>(json).unwrap_err();
        assert!(err.to_string().contains("must be 2 x 2"));

        let json = r#"{"levels": ["A", "B"], "counts": [[1, 0], [2, 3]]}"#;
        let cm: ConfusionMatrix = serde_json::from_str(json).unwrap();
        assert_eq!(cm.correct(), 4);
    }

    #[test]
    fn test_union_levels_sorted() {
        let union = ConfusionMatrix::union_levels(&levels(&["B", "C"]), &levels(&["A", "B"]));
        assert_eq!(union, levels(&["A", "B", "C"]));
    }

    #[test]
    fn test_unknown_value_rejected() {
        let err = ConfusionMatrix::from_values(levels(&["A"]), &["A"], &["Z"]).unwrap_err();
        assert!(err.to_string().contains("'Z'"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(ConfusionMatrix::from_values(levels(&["A"]), &["A", "A"], &["A"]).is_err());
    }

    #[test]
    fn test_display_table() {
        let cm = ConfusionMatrix::from_values(levels(&["A", "B"]), &["A", "B"], &["A", "A"]).unwrap();
        let text = cm.to_string();
        assert!(text.starts_with("pred \\ true"));
        assert_eq!(text.lines().count(), 3);
    }
}
