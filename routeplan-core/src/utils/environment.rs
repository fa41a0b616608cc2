use crate::utils::{DefaultRandom, Random};
use std::sync::Arc;

/// A logger type which is called with various information.
pub type InfoLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Keeps track of environment specific information which influences algorithm behavior.
#[derive(Clone)]
pub struct Environment {
    /// A wrapper on random generator.
    pub random: Arc<dyn Random>,

    /// An information logger.
    pub logger: InfoLogger,
}

impl Environment {
    /// Creates an instance of `Environment`.
    pub fn new(random: Arc<dyn Random>, logger: InfoLogger) -> Self {
        Self { random, logger }
    }

    /// Creates an instance of `Environment` with repeatable random and silent logger.
    pub fn new_quiet_repeatable() -> Self {
        Self::new(Arc::new(DefaultRandom::new_repeatable()), Arc::new(|_| {}))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Arc::new(DefaultRandom::default()), Arc::new(|msg: &str| println!("{msg}")))
    }
}
