//! This module contains clustering algorithms for points on a plane.

mod kmeans;
pub use self::kmeans::*;
