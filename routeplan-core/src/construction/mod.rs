//! Contains functionality to build the initial route assignment: stops are clustered into
//! capacity-bounded groups and every group is ordered into a visit sequence.

mod clustering;
pub use self::clustering::*;

mod planner;
pub use self::planner::*;

mod sequencing;
pub use self::sequencing::*;
