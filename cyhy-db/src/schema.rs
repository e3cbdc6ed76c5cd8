use crate::error::DbError;

const SCHEMA_SQL: &str = r#"
-- Known vulnerabilities (severity is derived from version + score on every save)
CREATE TABLE IF NOT EXISTS cves (
    id            TEXT PRIMARY KEY,
    cvss_score    REAL NOT NULL CHECK (cvss_score >= 0.0 AND cvss_score <= 10.0),
    cvss_version  TEXT NOT NULL CHECK (cvss_version IN ('2.0', '3.0', '3.1')),
    severity      INTEGER NOT NULL DEFAULT 1 CHECK (severity BETWEEN 1 AND 4)
);
CREATE INDEX IF NOT EXISTS idx_cves_severity ON cves(severity);

-- Scan documents (one row per scanned address per scan source)
CREATE TABLE IF NOT EXISTS scan_docs (
    id      TEXT PRIMARY KEY,
    ip      TEXT NOT NULL,
    ip_int  BLOB NOT NULL,
    latest  INTEGER NOT NULL DEFAULT 1,
    owner   TEXT NOT NULL,
    source  TEXT NOT NULL,
    time    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scan_docs_latest_ip ON scan_docs(latest, ip_int);
CREATE INDEX IF NOT EXISTS idx_scan_docs_time_owner ON scan_docs(time, owner);
CREATE INDEX IF NOT EXISTS idx_scan_docs_ip ON scan_docs(ip_int);

-- Snapshot tags, in the order they were pushed onto each document
CREATE TABLE IF NOT EXISTS scan_doc_snapshots (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_doc_id  TEXT NOT NULL REFERENCES scan_docs(id) ON DELETE CASCADE,
    snapshot_id  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_snapshot ON scan_doc_snapshots(snapshot_id);
CREATE INDEX IF NOT EXISTS idx_snapshots_doc ON scan_doc_snapshots(scan_doc_id);
"#;

pub fn initialize(conn: &rusqlite::Connection) -> Result<(), DbError> {
    // WAL and foreign keys go on before any DDL runs.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
