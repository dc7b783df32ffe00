pub mod config;
pub mod error;
pub mod intercept;
pub mod query;
pub mod session;
pub mod store;
pub mod validate;

pub use config::HarnessConfig;
pub use error::{CountError, EngineError};
pub use intercept::{Interception, RestoreHandle, TransportSlot};
pub use query::MatchMode;
pub use session::BeaconSession;
pub use store::{BeaconStore, LifecycleFlags, StoredBeacon};
