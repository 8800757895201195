use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::Policy;

/// What a workflow knows about a model update it wants to promote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Reported accuracy scaled by 10^4, if the commit carries scores.
    pub acc_times_1e4: Option<u32>,
    /// Attestation that differential privacy was applied in training.
    pub dp_applied: bool,
    /// Descriptor of the anomaly filter that was applied, if any.
    pub anomaly_filter_applied: Option<String>,
}

/// A single policy rule the candidate failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    AccuracyBelowMinimum { required: u32, actual: Option<u32> },
    DifferentialPrivacyMissing,
    AnomalyFilterMismatch { required: String, applied: Option<String> },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccuracyBelowMinimum { required, actual: Some(actual) } => {
                write!(f, "accuracy {actual} below minimum {required}")
            }
            Self::AccuracyBelowMinimum { required, actual: None } => {
                write!(f, "no scores reported; minimum accuracy is {required}")
            }
            Self::DifferentialPrivacyMissing => write!(f, "differential privacy required"),
            Self::AnomalyFilterMismatch { required, applied } => match applied {
                Some(applied) => write!(f, "anomaly filter '{applied}' applied, '{required}' required"),
                None => write!(f, "anomaly filter '{required}' required"),
            },
        }
    }
}

/// Outcome of checking a candidate against a policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub violations: Vec<Violation>,
}

impl PolicyVerdict {
    pub fn is_accepted(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Policy pre-check. Pure; never called by ledger writes.
pub struct PolicyCheck;

impl PolicyCheck {
    /// Evaluate every rule of `policy` and report all violations.
    pub fn evaluate(policy: &Policy, candidate: &Candidate) -> PolicyVerdict {
        let mut violations = Vec::new();

        if policy.min_accuracy > 0 {
            let passes = candidate
                .acc_times_1e4
                .is_some_and(|acc| acc >= policy.min_accuracy);
            if !passes {
                violations.push(Violation::AccuracyBelowMinimum {
                    required: policy.min_accuracy,
                    actual: candidate.acc_times_1e4,
                });
            }
        }

        if policy.dp_required && !candidate.dp_applied {
            violations.push(Violation::DifferentialPrivacyMissing);
        }

        if !policy.anomaly_filter.is_empty()
            && candidate.anomaly_filter_applied.as_deref() != Some(policy.anomaly_filter.as_str())
        {
            violations.push(Violation::AnomalyFilterMismatch {
                required: policy.anomaly_filter.clone(),
                applied: candidate.anomaly_filter_applied.clone(),
            });
        }

        PolicyVerdict { violations }
    }
}
