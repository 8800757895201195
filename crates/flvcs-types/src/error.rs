use std::fmt;

use thiserror::Error;

use crate::address::Address;

/// Errors produced when parsing identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// The role a mutating operation demands of its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Authority {
    /// Only the current owner.
    Owner,
    /// The owner or any member of the admin set.
    OwnerOrAdmin,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::OwnerOrAdmin => write!(f, "owner or admin"),
        }
    }
}

/// The kind of ledger record an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Commit,
    Tag,
    Branch,
    Policy,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Commit => "commit",
            Self::Tag => "tag",
            Self::Branch => "branch",
            Self::Policy => "policy",
        };
        write!(f, "{s}")
    }
}

/// Failure conditions of ledger operations.
///
/// Every failure aborts the whole operation: no state changes and no
/// notification is emitted. Nothing is retried inside the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller lacks the role the operation requires.
    #[error("{caller} is not authorized: requires {required}")]
    NotAuthorized { caller: Address, required: Authority },

    /// Duplicate commit id or branch name.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: Entity, id: String },

    /// A referenced commit, tag, policy, or branch is absent.
    #[error("{entity} does not exist: {id}")]
    DoesNotExist { entity: Entity, id: String },

    /// Malformed commit shape: null id, bad parent count, empty locator.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A precondition on referenced state did not hold (missing head
    /// commit, null new owner, ancestry violation).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An injected verification strategy rejected the commit.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// The execution substrate could not run the operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_authorized(caller: Address, required: Authority) -> Self {
        Self::NotAuthorized { caller, required }
    }

    pub fn already_exists(entity: Entity, id: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    pub fn does_not_exist(entity: Entity, id: impl fmt::Display) -> Self {
        Self::DoesNotExist {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition(reason.into())
    }

    /// Returns `true` for `NotAuthorized`.
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized { .. })
    }

    /// Returns `true` for `AlreadyExists`.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` for `DoesNotExist`.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
