pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::QuakeConfig;
pub use error::{QuakeError, Result};
pub use events::DomainEvent;
pub use types::*;
