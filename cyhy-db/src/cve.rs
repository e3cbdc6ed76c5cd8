// ---------------------------------------------------------------------------
// CVE records
// ---------------------------------------------------------------------------

use cyhy_types::{CvssScore, CvssVersion, Severity, ValidationError, classify};
use rusqlite::params;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DbError;
use crate::store::RecordStore;

/// A known vulnerability with its CVSS rating.
///
/// `severity` is derived. It is recomputed from version and score by
/// [`RecordStore::save_cve`] right before the row is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CveRecord {
    id: String,
    cvss_score: CvssScore,
    cvss_version: CvssVersion,
    severity: Severity,
}

impl CveRecord {
    /// Build a record, rejecting an out-of-range score. Severity starts at Low.
    pub fn new(
        id: impl Into<String>,
        cvss_version: CvssVersion,
        cvss_score: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: id.into(),
            cvss_score: CvssScore::new(cvss_score)?,
            cvss_version,
            severity: Severity::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cvss_score(&self) -> CvssScore {
        self.cvss_score
    }

    pub fn cvss_version(&self) -> CvssVersion {
        self.cvss_version
    }

    /// Severity as of the last [`calculate_severity`](Self::calculate_severity).
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Replace the score. The record is left untouched if `score` is rejected.
    pub fn set_cvss_score(&mut self, score: f64) -> Result<(), ValidationError> {
        self.cvss_score = CvssScore::new(score)?;
        Ok(())
    }

    pub fn set_cvss_version(&mut self, version: CvssVersion) {
        self.cvss_version = version;
    }

    pub fn calculate_severity(&mut self) {
        self.severity = classify(self.cvss_version, self.cvss_score);
    }
}

/// Raw column values, checked before they become a [`CveRecord`].
struct CveRow {
    id: String,
    cvss_score: f64,
    cvss_version: String,
    severity: u8,
}

impl TryFrom<CveRow> for CveRecord {
    type Error = ValidationError;

    fn try_from(row: CveRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            cvss_score: CvssScore::new(row.cvss_score)?,
            cvss_version: row.cvss_version.parse()?,
            severity: Severity::try_from(row.severity)?,
        })
    }
}

fn read_cve_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CveRow> {
    Ok(CveRow {
        id: row.get(0)?,
        cvss_score: row.get(1)?,
        cvss_version: row.get(2)?,
        severity: row.get(3)?,
    })
}

fn into_record(row: CveRow) -> Result<CveRecord, DbError> {
    let id = row.id.clone();
    CveRecord::try_from(row).map_err(|e| {
        warn!(cve_id = %id, error = %e, "stored CVE failed validation");
        DbError::Validation(e)
    })
}

impl RecordStore {
    /// Recompute the record's severity, then insert or replace its row.
    pub fn save_cve(&self, cve: &mut CveRecord) -> Result<(), DbError> {
        cve.calculate_severity();
        self.conn.execute(
            "INSERT INTO cves (id, cvss_score, cvss_version, severity)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                cvss_score = ?2, cvss_version = ?3, severity = ?4",
            params![
                cve.id,
                cve.cvss_score.value(),
                cve.cvss_version.as_str(),
                cve.severity.as_u8(),
            ],
        )?;
        debug!(
            cve_id = %cve.id,
            score = cve.cvss_score.value(),
            severity = cve.severity.as_u8(),
            "CVE saved"
        );
        Ok(())
    }

    /// Get a CVE record by ID.
    pub fn get_cve(&self, id: &str) -> Result<Option<CveRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cvss_score, cvss_version, severity FROM cves WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], read_cve_row)?;
        match rows.next() {
            Some(row) => into_record(row?).map(Some),
            None => Ok(None),
        }
    }

    /// Delete a CVE record. Returns whether a row was removed.
    pub fn delete_cve(&self, id: &str) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM cves WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Count stored CVE records.
    pub fn count_cves(&self) -> Result<u64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cves", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// CVEs at or above `min`, highest score first.
    pub fn cves_with_min_severity(&self, min: Severity) -> Result<Vec<CveRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cvss_score, cvss_version, severity FROM cves
             WHERE severity >= ?1 ORDER BY cvss_score DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![min.as_u8()], read_cve_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }
}
