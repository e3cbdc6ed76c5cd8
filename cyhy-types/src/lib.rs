pub mod cvss;
pub mod error;
pub mod ip;
pub mod time;

pub use cvss::{CvssScore, CvssVersion, Severity, classify, validate_score};
pub use error::ValidationError;
pub use ip::AddressValue;
pub use time::utcnow;
