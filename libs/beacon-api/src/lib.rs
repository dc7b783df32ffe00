pub mod error;
pub mod field;
pub mod hash;
pub mod host;
pub mod record;
pub mod report;
pub mod timer;
pub mod transport;
pub mod value;

pub use error::AssertionFailure;
pub use field::{Field, FieldClass};
pub use host::{HostEnvironment, ResourceTimingEntry, StaticHost};
pub use record::{BeaconRecord, BeaconRecordBuilder};
pub use report::{Assertion, ValidationResult};
pub use timer::TimerMap;
pub use transport::{BeaconSender, Transport};
pub use value::FieldValue;
