//! A command line interface to the delivery route planning engine.
//!
//! The library part exposes the functions behind the commands so that they can be used without
//! the binary: initial planning of stops and change detection between two stop lists.

#![warn(missing_docs)]

pub use routeplan_core as core;

pub mod extensions;
