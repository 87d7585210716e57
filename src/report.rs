//! Classification report comparing predictions with ground-truth labels.

use std::fmt;

use smartcore::metrics::accuracy;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub class: i32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Average {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: Average,
    pub weighted_avg: Average,
    pub support: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    /// Build a report over paired labels and predictions.
    ///
    /// Classes are the sorted union of both sequences. Empty or unequal
    /// inputs yield `None`.
    pub fn new(y_true: &[i32], y_pred: &[i32]) -> Option<Self> {
        if y_true.is_empty() || y_true.len() != y_pred.len() {
            return None;
        }
        let mut labels: Vec<i32> = y_true.iter().chain(y_pred).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let classes: Vec<ClassScores> = labels
            .into_iter()
            .map(|class| {
                let support = y_true.iter().filter(|&&t| t == class).count();
                let predicted = y_pred.iter().filter(|&&p| p == class).count();
                let hits = y_true
                    .iter()
                    .zip(y_pred)
                    .filter(|&(&t, &p)| t == class && p == class)
                    .count();
                let precision = ratio(hits, predicted);
                let recall = ratio(hits, support);
                ClassScores {
                    class,
                    precision,
                    recall,
                    f1: harmonic(precision, recall),
                    support,
                }
            })
            .collect();

        let total = y_true.len();
        let n = classes.len() as f64;
        let macro_avg = Average {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
        };
        let weight = |score: fn(&ClassScores) -> f64| {
            classes
                .iter()
                .map(|c| score(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = Average {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
        };

        Some(Self {
            accuracy: accuracy(&y_true.to_vec(), &y_pred.to_vec()),
            classes,
            macro_avg,
            weighted_avg,
            support: total,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}
