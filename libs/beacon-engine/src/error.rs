#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Prefix the message with `ctx`, typically the config file path.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
        }
    }
}

/// Failure of a "wait for exactly N beacons" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CountError {
    /// More beacons than expected showed up before the count settled.
    #[error("too many beacons: expected {expected} but got {actual}")]
    TooMany { expected: usize, actual: usize },

    /// The count was reached but changed during the settle delay.
    #[error("beacon count {actual} != {expected} after settle delay")]
    Mismatch { expected: usize, actual: usize },
}
