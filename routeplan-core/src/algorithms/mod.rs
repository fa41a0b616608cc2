//! This module contains generic algorithms which are not bound to delivery domain.

pub mod clustering;
pub mod sequencing;
