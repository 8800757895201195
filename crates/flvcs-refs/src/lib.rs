//! Branches over the FL commit graph.
//!
//! A branch is a named, mutable pointer at a stored commit, optionally
//! linked to an acceptance policy. Branches are created once and never
//! deleted; their head moves by [`BranchManager::advance`] or
//! [`BranchManager::rollback`].

pub mod branch;

pub use branch::{Branch, BranchConfig, BranchManager};
