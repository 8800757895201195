//! Acceptance policies for FL model branches.
//!
//! A [`Policy`] records the bar a model update should clear before it is
//! promoted on a branch: a minimum accuracy, whether differential privacy is
//! mandatory, and which anomaly filter must have been applied. The
//! [`PolicyRegistry`] stores policies keyed by a hash of their name.
//!
//! Policies are linked from branches but never enforced by ledger writes.
//! Workflows that want enforcement call [`PolicyCheck::evaluate`] before
//! advancing a branch.

pub mod check;
pub mod registry;

pub use check::{Candidate, PolicyCheck, PolicyVerdict, Violation};
pub use registry::{Policy, PolicyRegistry};
