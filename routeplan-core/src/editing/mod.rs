//! Contains the staged editing pipeline: operator actions are staged in [EditBuffer], diffed by
//! [detect_route_changes] against committed state and persisted by [CommitCoordinator].

mod buffer;
pub use self::buffer::*;

mod changes;
pub use self::changes::*;

mod commit;
pub use self::commit::*;

mod lifecycle;
pub use self::lifecycle::*;

mod registry;
pub use self::registry::*;
