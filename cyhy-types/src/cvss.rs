// ---------------------------------------------------------------------------
// CVSS score validation and severity classification
// ---------------------------------------------------------------------------
//
// Severity bands follow https://nvd.nist.gov/vuln-metrics/cvss. NVD publishes
// them as closed ranges with gaps between them (8.95 is in no v3 range).
// Matching each band on its lower bound, highest first, closes the gaps.
//
// A v3 score of 0.0 is "None" upstream; here it maps to Low because consumers
// of stored records assume a severity in 1..=4.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

const MIN_SCORE: f64 = 0.0;
const MAX_SCORE: f64 = 10.0;

/// Lower bounds for CVSS 2.0, checked top-down. The 2.0 scale tops out at
/// exactly 10.0, so the Critical band only ever holds 10.0 itself.
const V2_BANDS: &[(f64, Severity)] = &[
    (10.0, Severity::Critical),
    (7.0, Severity::High),
    (4.0, Severity::Medium),
];

/// Lower bounds for CVSS 3.0 and 3.1, checked top-down.
const V3_BANDS: &[(f64, Severity)] = &[
    (9.0, Severity::Critical),
    (7.0, Severity::High),
    (4.0, Severity::Medium),
];

/// CVSS specification version a score was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CvssVersion {
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
}

impl CvssVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvssVersion::V2_0 => "2.0",
            CvssVersion::V3_0 => "3.0",
            CvssVersion::V3_1 => "3.1",
        }
    }

    fn bands(&self) -> &'static [(f64, Severity)] {
        match self {
            CvssVersion::V2_0 => V2_BANDS,
            CvssVersion::V3_0 | CvssVersion::V3_1 => V3_BANDS,
        }
    }
}

impl fmt::Display for CvssVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CvssVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.0" => Ok(CvssVersion::V2_0),
            "3.0" => Ok(CvssVersion::V3_0),
            "3.1" => Ok(CvssVersion::V3_1),
            other => Err(ValidationError::UnknownCvssVersion {
                value: other.to_string(),
            }),
        }
    }
}

/// A CVSS base score, guaranteed to lie in `[0.0, 10.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CvssScore(f64);

impl CvssScore {
    pub fn new(score: f64) -> Result<Self, ValidationError> {
        validate_score(score).map(Self)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for CvssScore {
    type Error = ValidationError;

    fn try_from(score: f64) -> Result<Self, Self::Error> {
        Self::new(score)
    }
}

impl From<CvssScore> for f64 {
    fn from(score: CvssScore) -> Self {
        score.0
    }
}

impl fmt::Display for CvssScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Coarse severity derived from a CVSS version and score.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Severity::Low),
            2 => Ok(Severity::Medium),
            3 => Ok(Severity::High),
            4 => Ok(Severity::Critical),
            _ => Err(ValidationError::InvalidSeverity { value }),
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.as_u8()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.label())
    }
}

/// Check that a raw score lies in `[0.0, 10.0]`. NaN is rejected.
pub fn validate_score(score: f64) -> Result<f64, ValidationError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError::ScoreOutOfRange { score })
    }
}

/// Map a validated score to its severity under the given CVSS version.
pub fn classify(version: CvssVersion, score: CvssScore) -> Severity {
    version
        .bands()
        .iter()
        .find(|(floor, _)| score.value() >= *floor)
        .map(|(_, severity)| *severity)
        .unwrap_or(Severity::Low)
}
