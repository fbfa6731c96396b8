use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Errors surfaced by the runtime core.
///
/// Constructor and handler failures carry their cause in an `Arc` so the
/// same error can be routed to the scheduler's failure handler and, for
/// handler deaths, into the reactor's own `Died` lifecycle event.
#[derive(Debug, Clone)]
pub enum ReactorError {
    /// The reactor factory failed or panicked; the frame never came up.
    Ctor(Arc<anyhow::Error>),
    /// An event handler panicked during a batch.
    Handler(Arc<anyhow::Error>),
    /// The requested name is already taken in the target registry.
    DuplicateName(String),
    /// Operation on a frame or system that already terminated.
    Terminated(String),
    /// A proto referenced a scheduler name missing from the bundle.
    UnknownScheduler(String),
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ctor(err) => write!(f, "reactor constructor failed: {err}"),
            Self::Handler(err) => write!(f, "event handler failed: {err}"),
            Self::DuplicateName(name) => write!(f, "name `{name}` is already taken"),
            Self::Terminated(name) => write!(f, "`{name}` has terminated"),
            Self::UnknownScheduler(name) => write!(f, "no scheduler registered as `{name}`"),
        }
    }
}

impl Error for ReactorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ctor(err) | Self::Handler(err) => Some(err.as_ref().as_ref()),
            _ => None,
        }
    }
}
