//! Contains command implementations which work with readers and writers.

pub mod diff;
pub mod plan;
