pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod logging;
pub mod models;
pub mod notify;
pub mod protocol;
pub mod runtime;
pub mod service;

#[cfg(test)]
pub mod test_helpers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use dispatch::{Credential, EngineSettings, EventDispatcher};
pub use error::{Error, Result};
pub use runtime::{SyncHandle, SyncServer};
