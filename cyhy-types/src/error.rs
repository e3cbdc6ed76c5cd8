/// Rejected field value. Every variant carries the offending input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("CVSS score must be between 0.0 and 10.0 inclusive (got {score})")]
    ScoreOutOfRange { score: f64 },
    #[error("unknown CVSS version \"{value}\" (expected one of 2.0, 3.0, 3.1)")]
    UnknownCvssVersion { value: String },
    #[error("invalid severity {value} (expected 1-4)")]
    InvalidSeverity { value: u8 },
    #[error("Value \"{value}\" is not a valid IP address.")]
    InvalidAddress { value: String },
    #[error("Value \"{value}\" cannot be converted to a string IP address.")]
    NotSerializable { value: String },
}
