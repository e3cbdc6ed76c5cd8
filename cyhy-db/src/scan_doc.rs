// ---------------------------------------------------------------------------
// Scan documents
// ---------------------------------------------------------------------------
//
// One document per scanned address per source. `latest` marks the newest
// document for an address; snapshots tag documents into reporting snapshots.

use std::net::IpAddr;

use chrono::{DateTime, SubsecRound, Utc};
use cyhy_types::{AddressValue, ValidationError, ip, utcnow};
use rusqlite::{Connection, params, params_from_iter};
use serde::Serialize;
use tracing::debug;

use crate::error::DbError;
use crate::store::{RecordStore, placeholders};

/// Scan result metadata for one address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanDoc {
    id: String,
    #[serde(serialize_with = "ip::as_string::serialize")]
    ip: IpAddr,
    #[serde(skip)]
    ip_int: u128,
    pub latest: bool,
    pub owner: String,
    /// Snapshot ids, in the order they were tagged.
    pub snapshots: Vec<String>,
    pub source: String,
    time: DateTime<Utc>,
}

impl ScanDoc {
    /// New latest document stamped with the current time.
    pub fn new(
        ip: impl Into<AddressValue>,
        owner: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let ip = ip::parse(ip)?;
        Ok(Self {
            id: format!("scan-{}", uuid::Uuid::new_v4()),
            ip,
            ip_int: ip::to_int(ip),
            latest: true,
            owner: owner.into(),
            snapshots: Vec::new(),
            source: source.into(),
            time: utcnow().trunc_subsecs(3),
        })
    }

    /// Replace the timestamp. Stored with millisecond precision.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time.trunc_subsecs(3);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn ip_int(&self) -> u128 {
        self.ip_int
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Change the address, keeping `ip_int` in step.
    pub fn set_ip(&mut self, ip: impl Into<AddressValue>) -> Result<(), ValidationError> {
        let ip = ip::parse(ip)?;
        self.ip = ip;
        self.ip_int = ip::to_int(ip);
        Ok(())
    }
}

/// Big-endian bytes so BLOB comparison orders like the integer.
fn ip_int_key(ip: IpAddr) -> [u8; 16] {
    ip::to_int(ip).to_be_bytes()
}

struct ScanDocRow {
    id: String,
    ip: String,
    latest: bool,
    owner: String,
    source: String,
    time_ms: i64,
}

fn read_scan_doc_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanDocRow> {
    Ok(ScanDocRow {
        id: row.get(0)?,
        ip: row.get(1)?,
        latest: row.get(2)?,
        owner: row.get(3)?,
        source: row.get(4)?,
        time_ms: row.get(5)?,
    })
}

const SELECT_SCAN_DOC: &str = "SELECT id, ip, latest, owner, source, time FROM scan_docs";

fn write_scan_doc(conn: &Connection, doc: &ScanDoc) -> Result<(), DbError> {
    let stored_ip = ip::serialize(Some(&AddressValue::Canonical(doc.ip)))?;
    conn.execute(
        "INSERT INTO scan_docs (id, ip, ip_int, latest, owner, source, time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            ip = ?2, ip_int = ?3, latest = ?4, owner = ?5, source = ?6, time = ?7",
        params![
            doc.id,
            stored_ip,
            &ip_int_key(doc.ip)[..],
            doc.latest,
            doc.owner,
            doc.source,
            doc.time.timestamp_millis(),
        ],
    )?;

    conn.execute(
        "DELETE FROM scan_doc_snapshots WHERE scan_doc_id = ?1",
        params![doc.id],
    )?;
    for snapshot_id in &doc.snapshots {
        conn.execute(
            "INSERT INTO scan_doc_snapshots (scan_doc_id, snapshot_id) VALUES (?1, ?2)",
            params![doc.id, snapshot_id],
        )?;
    }
    Ok(())
}

fn clear_latest_for(conn: &Connection, ips: &[IpAddr]) -> Result<usize, DbError> {
    if ips.is_empty() {
        return Ok(0);
    }
    let keys: Vec<Vec<u8>> = ips.iter().map(|ip| ip_int_key(*ip).to_vec()).collect();
    let sql = format!(
        "UPDATE scan_docs SET latest = 0 WHERE latest = 1 AND ip_int IN ({})",
        placeholders(keys.len())
    );
    Ok(conn.execute(&sql, params_from_iter(keys.iter()))?)
}

impl RecordStore {
    /// Insert or replace a scan document together with its snapshot list.
    pub fn save_scan_doc(&self, doc: &ScanDoc) -> Result<(), DbError> {
        let tx = self.conn.unchecked_transaction()?;
        write_scan_doc(&tx, doc)?;
        tx.commit()?;
        debug!(scan_doc_id = %doc.id, ip = %doc.ip, owner = %doc.owner, "scan doc saved");
        Ok(())
    }

    /// Save `doc` after clearing the latest flag on earlier documents for the
    /// same address. Both writes commit together or not at all. Returns the
    /// number of documents that lost the flag.
    pub fn add_latest_scan_doc(&self, doc: &ScanDoc) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let superseded = clear_latest_for(&tx, &[doc.ip])?;
        write_scan_doc(&tx, doc)?;
        tx.commit()?;
        debug!(scan_doc_id = %doc.id, ip = %doc.ip, superseded, "latest scan doc added");
        Ok(superseded)
    }

    /// Get a scan document by ID.
    pub fn get_scan_doc(&self, id: &str) -> Result<Option<ScanDoc>, DbError> {
        let sql = format!("{SELECT_SCAN_DOC} WHERE id = ?1");
        Ok(self.query_scan_docs(&sql, params![id])?.into_iter().next())
    }

    /// Delete a scan document (its snapshot tags cascade).
    pub fn delete_scan_doc(&self, id: &str) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM scan_docs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Latest documents for an owner, newest first.
    pub fn latest_scan_docs(&self, owner: &str) -> Result<Vec<ScanDoc>, DbError> {
        let sql = format!("{SELECT_SCAN_DOC} WHERE latest = 1 AND owner = ?1 ORDER BY time DESC, id");
        self.query_scan_docs(&sql, params![owner])
    }

    /// Documents carrying a snapshot tag, oldest first.
    pub fn scan_docs_tagged(&self, snapshot_id: &str) -> Result<Vec<ScanDoc>, DbError> {
        let sql = format!(
            "{SELECT_SCAN_DOC} WHERE id IN \
             (SELECT scan_doc_id FROM scan_doc_snapshots WHERE snapshot_id = ?1) \
             ORDER BY time, id"
        );
        self.query_scan_docs(&sql, params![snapshot_id])
    }

    /// Clear the latest flag on every latest document of `owner`.
    pub fn reset_latest_flag_by_owner(&self, owner: &str) -> Result<usize, DbError> {
        let updated = self.conn.execute(
            "UPDATE scan_docs SET latest = 0 WHERE latest = 1 AND owner = ?1",
            params![owner],
        )?;
        debug!(owner, updated, "latest flag reset by owner");
        Ok(updated)
    }

    /// Clear the latest flag on every latest document for any of `ips`.
    pub fn reset_latest_flag_by_ip(&self, ips: &[IpAddr]) -> Result<usize, DbError> {
        let updated = clear_latest_for(&self.conn, ips)?;
        debug!(ips = ips.len(), updated, "latest flag reset by ip");
        Ok(updated)
    }

    /// Tag the latest documents of `owners` with `snapshot_id`.
    pub fn tag_latest(&self, owners: &[&str], snapshot_id: &str) -> Result<usize, DbError> {
        if owners.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO scan_doc_snapshots (scan_doc_id, snapshot_id)
             SELECT id, ? FROM scan_docs WHERE latest = 1 AND owner IN ({}) ORDER BY id",
            placeholders(owners.len())
        );
        let args = std::iter::once(snapshot_id).chain(owners.iter().copied());
        let tagged = self.conn.execute(&sql, params_from_iter(args))?;
        debug!(snapshot_id, tagged, "tagged latest scan docs");
        Ok(tagged)
    }

    /// Tag every document already carrying one of `existing_snapshot_ids`
    /// with `new_snapshot_id`.
    pub fn tag_matching(
        &self,
        existing_snapshot_ids: &[&str],
        new_snapshot_id: &str,
    ) -> Result<usize, DbError> {
        if existing_snapshot_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO scan_doc_snapshots (scan_doc_id, snapshot_id)
             SELECT DISTINCT scan_doc_id, ? FROM scan_doc_snapshots
             WHERE snapshot_id IN ({}) ORDER BY scan_doc_id",
            placeholders(existing_snapshot_ids.len())
        );
        let args = std::iter::once(new_snapshot_id).chain(existing_snapshot_ids.iter().copied());
        let tagged = self.conn.execute(&sql, params_from_iter(args))?;
        debug!(new_snapshot_id, tagged, "tagged matching scan docs");
        Ok(tagged)
    }

    /// Tag documents of `owner` timestamped within `[start, end]`.
    pub fn tag_timespan(
        &self,
        owner: &str,
        snapshot_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let tagged = self.conn.execute(
            "INSERT INTO scan_doc_snapshots (scan_doc_id, snapshot_id)
             SELECT id, ?1 FROM scan_docs
             WHERE owner = ?2 AND time >= ?3 AND time <= ?4 ORDER BY id",
            params![
                snapshot_id,
                owner,
                start.timestamp_millis(),
                end.timestamp_millis()
            ],
        )?;
        debug!(owner, snapshot_id, tagged, "tagged scan docs in timespan");
        Ok(tagged)
    }

    /// Remove every occurrence of `snapshot_id`. Returns the number of
    /// documents that carried it.
    pub fn remove_tag(&self, snapshot_id: &str) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let docs: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT scan_doc_id) FROM scan_doc_snapshots WHERE snapshot_id = ?1",
            params![snapshot_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "DELETE FROM scan_doc_snapshots WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;
        tx.commit()?;
        debug!(snapshot_id, docs, "snapshot tag removed");
        Ok(docs as usize)
    }

    fn query_scan_docs<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ScanDoc>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_scan_doc_row)?;
        let mut docs = Vec::new();
        for row in rows {
            docs.push(self.hydrate_scan_doc(row?)?);
        }
        Ok(docs)
    }

    fn hydrate_scan_doc(&self, row: ScanDocRow) -> Result<ScanDoc, DbError> {
        let ip = ip::parse(row.ip)?;
        let time = DateTime::from_timestamp_millis(row.time_ms).ok_or_else(|| {
            DbError::Other(format!(
                "scan doc {} has invalid timestamp {}",
                row.id, row.time_ms
            ))
        })?;
        let snapshots = self.snapshots_for(&row.id)?;
        Ok(ScanDoc {
            id: row.id,
            ip,
            ip_int: ip::to_int(ip),
            latest: row.latest,
            owner: row.owner,
            snapshots,
            source: row.source,
            time,
        })
    }

    fn snapshots_for(&self, scan_doc_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_id FROM scan_doc_snapshots WHERE scan_doc_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![scan_doc_id], |row| row.get::<_, String>(0))?;
        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }
}
