pub use crate::config::SystemConfig;
pub use crate::context::current_frame;
pub use crate::error::ReactorError;
pub use crate::events::Events;
pub use crate::frame::{Channel, Connector, Frame, Lifecycle};
pub use crate::io::{EventQueue, QueueKind};
pub use crate::reactor::{Proto, Reactor, ReactorScope, SysEvent};
pub use crate::scheduler::{
    FailureHook, NewThread, Piggyback, Scheduler, SchedulerBundle, SchedulerState, ThreadPool,
    Timer,
};
pub use crate::system::ReactorSystem;
pub use crate::utils::logger::LoggerConfig;
