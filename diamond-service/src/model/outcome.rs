// Run outcomes
// Totally ordered build results and the join threshold built on top of them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a finished run.
///
/// Variants are declared best-first so the derived ordering matches
/// severity: `Success < Unstable < Failure < Aborted`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Success,
    Unstable,
    Failure,
    Aborted,
}

impl Outcome {
    /// Combine two outcomes, keeping the worse one.
    ///
    /// `Success` is the identity and `Aborted` absorbs everything.
    pub fn combine(self, other: Outcome) -> Outcome {
        self.max(other)
    }

    pub fn is_worse_than(self, other: Outcome) -> bool {
        self > other
    }

    pub fn is_better_or_equal(self, other: Outcome) -> bool {
        self <= other
    }

    /// Fold any number of outcomes into one
    pub fn fold<I: IntoIterator<Item = Outcome>>(outcomes: I) -> Outcome {
        outcomes
            .into_iter()
            .fold(Outcome::Success, Outcome::combine)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Unstable => "UNSTABLE",
            Outcome::Failure => "FAILURE",
            Outcome::Aborted => "ABORTED",
        };
        f.write_str(label)
    }
}

/// Minimum aggregate outcome a join accepts before it starts its targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    #[default]
    Success,
    Unstable,
}

impl Threshold {
    pub fn as_outcome(self) -> Outcome {
        match self {
            Threshold::Success => Outcome::Success,
            Threshold::Unstable => Outcome::Unstable,
        }
    }

    /// Whether an aggregate outcome satisfies this threshold
    pub fn is_met_by(self, aggregate: Outcome) -> bool {
        !aggregate.is_worse_than(self.as_outcome())
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_outcome().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Outcome; 4] = [
        Outcome::Success,
        Outcome::Unstable,
        Outcome::Failure,
        Outcome::Aborted,
    ];

    #[test]
    fn test_ordering() {
        assert!(Outcome::Success < Outcome::Unstable);
        assert!(Outcome::Unstable < Outcome::Failure);
        assert!(Outcome::Failure < Outcome::Aborted);
        assert!(Outcome::Failure.is_worse_than(Outcome::Unstable));
        assert!(!Outcome::Unstable.is_worse_than(Outcome::Unstable));
    }

    #[test]
    fn test_combine_is_a_monoid() {
        for a in ALL {
            assert_eq!(a.combine(Outcome::Success), a);
            assert_eq!(a.combine(Outcome::Aborted), Outcome::Aborted);
            assert_eq!(a.combine(a), a);
            for b in ALL {
                assert_eq!(a.combine(b), b.combine(a));
                for c in ALL {
                    assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
                }
            }
        }
    }

    #[test]
    fn test_fold_is_order_independent() {
        let forward = [
            Outcome::Success,
            Outcome::Unstable,
            Outcome::Success,
            Outcome::Failure,
        ];
        let mut backward = forward;
        backward.reverse();

        assert_eq!(Outcome::fold(forward), Outcome::Failure);
        assert_eq!(Outcome::fold(backward), Outcome::Failure);
        assert_eq!(Outcome::fold(Vec::new()), Outcome::Success);
    }

    #[test]
    fn test_threshold() {
        assert!(Threshold::Success.is_met_by(Outcome::Success));
        assert!(!Threshold::Success.is_met_by(Outcome::Unstable));
        assert!(Threshold::Unstable.is_met_by(Outcome::Unstable));
        assert!(!Threshold::Unstable.is_met_by(Outcome::Failure));
    }

    #[test]
    fn test_serde_names() {
        let outcome: Outcome = serde_yaml::from_str("unstable").unwrap();
        assert_eq!(outcome, Outcome::Unstable);
        let threshold: Threshold = serde_yaml::from_str("success").unwrap();
        assert_eq!(threshold, Threshold::Success);
    }
}
