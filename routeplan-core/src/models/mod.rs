//! A collection of models to represent stops, routes and their changes.

mod change;
pub use self::change::*;

mod config;
pub use self::config::*;

mod route;
pub use self::route::*;

mod stop;
pub use self::stop::*;
