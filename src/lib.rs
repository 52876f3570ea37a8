pub mod addr;
pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod link;
pub mod protocol;
pub mod scheduler;
pub mod state_machine;

pub use addr::Peer;
pub use bus::{Bus, ControlEvent};
pub use config::Config;
pub use engine::ControlEngine;
pub use error::{EngineError, FatalConfigError, FrameError, LinkError};
pub use link::{DuplexChannel, SerialLink};
pub use scheduler::{Clock, Scheduler, SystemClock, VirtualClock};
pub use state_machine::{ControlState, StateMachine};
