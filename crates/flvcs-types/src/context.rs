use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::temporal::Timestamp;

/// Who is writing, and when.
///
/// Built by the execution substrate (the ledger facade) for each write and
/// passed to every mutating component operation. Components copy these
/// values into records (`submitter`, `timestamp`) and never accept them from
/// the caller's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Authenticated caller.
    pub caller: Address,
    /// Time at which the write executes.
    pub timestamp: Timestamp,
}

impl ExecutionContext {
    pub fn new(caller: Address, timestamp: Timestamp) -> Self {
        Self { caller, timestamp }
    }

    /// Context stamped with the current wall-clock time.
    pub fn now(caller: Address) -> Self {
        Self::new(caller, Timestamp::now())
    }
}
