//! Capability directory and lease manager for a pool of remote devices.
//!
//! Devices are discovered by polling Selenium Grid hubs, offered to callers
//! as signed capability tokens, and handed out as exclusive, time-bounded
//! leases proven by signed lock tokens. [`DeviceLab`] ties the pieces
//! together; the modules can also be used on their own.

pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod grid;
pub mod hubs;
pub mod lease;
pub mod query;
pub mod service;
pub mod tasks;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::ServiceConfig;
pub use discovery::{Directory, Snapshot};
pub use error::{ErrorCode, LabError, Result};
pub use grid::{HttpGridClient, SessionSource, TopologySource};
pub use hubs::{ChainedHubs, FileHubs, HubSource, StaticHubs};
pub use lease::{Lease, LeaseManager};
pub use query::CapabilityQuery;
pub use service::DeviceLab;
pub use tasks::TaskRegistry;
pub use token::TokenCodec;
