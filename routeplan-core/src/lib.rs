//! Core crate contains the building blocks to plan delivery routes and to reorganize them through
//! staged, atomically committed edits.
//!
//! # Overview
//!
//! Initial routes are produced by [construction]: stops are split into geographically coherent,
//! capacity-bounded groups and every group is ordered into a visit sequence. All subsequent changes
//! go through [editing]: operator actions are staged in an [editing::EditBuffer], diffed against the
//! committed state and written back to the store by the [editing::CommitCoordinator].
//!
//! External collaborators (persistent store, route geometry computation, agent notifications) are
//! described by traits in [services].

#![warn(missing_docs)]

#[cfg(test)]
#[path = "../tests/helpers/mod.rs"]
#[macro_use]
pub mod helpers;

pub mod algorithms;
pub mod construction;
pub mod editing;
pub mod models;
pub mod prelude;
pub mod services;
pub mod utils;
