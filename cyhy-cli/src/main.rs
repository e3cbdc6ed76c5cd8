mod args;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cyhy_db::{CveRecord, RecordStore, ScanDoc, default_db_path};
use cyhy_types::{CvssVersion, Severity};
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::{Args, Command, CveCommand, ScanCommand};

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let path = args.db.clone().unwrap_or_else(default_db_path);
    let store = RecordStore::open(&path)
        .with_context(|| format!("failed to open record database {}", path.display()))?;

    match args.command {
        Command::Cve(cmd) => run_cve(&store, cmd),
        Command::Scan(cmd) => run_scan(&store, cmd),
    }
}

fn run_cve(store: &RecordStore, cmd: CveCommand) -> Result<()> {
    match cmd {
        CveCommand::Save {
            id,
            cvss_version,
            score,
        } => {
            let version: CvssVersion = cvss_version.parse()?;
            let mut cve = CveRecord::new(id, version, score)?;
            store.save_cve(&mut cve).context("failed to save CVE")?;
            info!(cve_id = cve.id(), severity = cve.severity().as_u8(), "CVE saved");
            println!("{}", serde_json::to_string_pretty(&cve)?);
        }
        CveCommand::Show { id } => {
            let Some(cve) = store.get_cve(&id).context("failed to load CVE")? else {
                bail!("CVE {id} not found");
            };
            println!("{}", serde_json::to_string_pretty(&cve)?);
        }
        CveCommand::List { min_severity } => {
            let min = Severity::try_from(min_severity)?;
            let cves = store
                .cves_with_min_severity(min)
                .context("failed to list CVEs")?;
            if cves.is_empty() {
                println!("No CVEs found.");
            } else {
                println!("{:<20} {:<8} {:<6} SEVERITY", "CVE ID", "VERSION", "SCORE");
                for cve in &cves {
                    println!(
                        "{:<20} {:<8} {:<6} {}",
                        cve.id(),
                        cve.cvss_version(),
                        cve.cvss_score(),
                        cve.severity()
                    );
                }
            }
        }
    }
    Ok(())
}

fn run_scan(store: &RecordStore, cmd: ScanCommand) -> Result<()> {
    match cmd {
        ScanCommand::Add { ip, owner, source } => {
            let doc = ScanDoc::new(ip, owner, source)?;
            let reset = store
                .add_latest_scan_doc(&doc)
                .context("failed to save scan document")?;
            info!(scan_doc_id = doc.id(), superseded = reset, "scan document added");
            println!("{}", doc.id());
        }
        ScanCommand::Show { id } => {
            let Some(doc) = store
                .get_scan_doc(&id)
                .context("failed to load scan document")?
            else {
                bail!("scan document {id} not found");
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        ScanCommand::TagLatest { snapshot, owners } => {
            let owners: Vec<&str> = owners.iter().map(String::as_str).collect();
            let tagged = store
                .tag_latest(&owners, &snapshot)
                .context("failed to tag latest scan documents")?;
            println!("Tagged {tagged} document(s) with {snapshot}.");
        }
        ScanCommand::RemoveTag { snapshot } => {
            let removed = store
                .remove_tag(&snapshot)
                .context("failed to remove snapshot tag")?;
            println!("Removed {snapshot} from {removed} document(s).");
        }
        ScanCommand::ResetLatest { owner } => {
            let reset = store
                .reset_latest_flag_by_owner(&owner)
                .context("failed to reset latest flag")?;
            println!("Cleared latest flag on {reset} document(s).");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyhy_types::ip;

    #[test]
    fn parse_cve_save() {
        let args = Args::try_parse_from([
            "cyhy",
            "cve",
            "save",
            "--id",
            "CVE-2024-6387",
            "--cvss-version",
            "3.1",
            "--score",
            "8.1",
        ])
        .unwrap();
        match args.command {
            Command::Cve(CveCommand::Save {
                id,
                cvss_version,
                score,
            }) => {
                assert_eq!(id, "CVE-2024-6387");
                assert_eq!(cvss_version, "3.1");
                assert_eq!(score, 8.1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_tag_latest_requires_owner() {
        assert!(Args::try_parse_from(["cyhy", "scan", "tag-latest", "--snapshot", "s1"]).is_err());
        let args =
            Args::try_parse_from(["cyhy", "scan", "tag-latest", "--snapshot", "s1", "A", "B"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::Scan(ScanCommand::TagLatest { ref owners, .. }) if owners.len() == 2
        ));
    }

    #[test]
    fn min_severity_range_enforced() {
        assert!(Args::try_parse_from(["cyhy", "cve", "list", "--min-severity", "5"]).is_err());
        assert!(Args::try_parse_from(["cyhy", "cve", "list", "--min-severity", "4"]).is_ok());
    }

    #[test]
    fn scan_add_end_to_end_in_memory() {
        let store = RecordStore::open_in_memory().unwrap();
        run_scan(
            &store,
            ScanCommand::Add {
                ip: "10.0.0.1".into(),
                owner: "ORG".into(),
                source: "nmap".into(),
            },
        )
        .unwrap();
        run_scan(
            &store,
            ScanCommand::Add {
                ip: "10.0.0.1".into(),
                owner: "ORG".into(),
                source: "nmap".into(),
            },
        )
        .unwrap();
        let latest = store.latest_scan_docs("ORG").unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].ip(), ip::parse("10.0.0.1").unwrap());
    }

    fn add(store: &RecordStore, ip: &str) -> Result<()> {
        run_scan(
            store,
            ScanCommand::Add {
                ip: ip.into(),
                owner: "ORG".into(),
                source: "nmap".into(),
            },
        )
    }

    #[test]
    fn scan_write_failures_keep_state_and_add_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyhy.db");
        let store = RecordStore::open(&path).unwrap();
        add(&store, "10.0.0.1").unwrap();
        store.tag_latest(&["ORG"], "s1").unwrap();
        let first = store.latest_scan_docs("ORG").unwrap();

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_doc_insert BEFORE INSERT ON scan_docs
                 BEGIN SELECT RAISE(ABORT, 'write failed'); END;
                 CREATE TRIGGER reject_doc_update BEFORE UPDATE ON scan_docs
                 BEGIN SELECT RAISE(ABORT, 'write failed'); END;
                 CREATE TRIGGER reject_tag_insert BEFORE INSERT ON scan_doc_snapshots
                 BEGIN SELECT RAISE(ABORT, 'write failed'); END;
                 CREATE TRIGGER reject_tag_delete BEFORE DELETE ON scan_doc_snapshots
                 BEGIN SELECT RAISE(ABORT, 'write failed'); END;",
            )
            .unwrap();

        let err = add(&store, "10.0.0.1").unwrap_err();
        assert_eq!(err.to_string(), "failed to save scan document");
        assert_eq!(store.latest_scan_docs("ORG").unwrap(), first);

        let cases = [
            (
                ScanCommand::TagLatest {
                    snapshot: "s2".into(),
                    owners: vec!["ORG".into()],
                },
                "failed to tag latest scan documents",
            ),
            (
                ScanCommand::RemoveTag {
                    snapshot: "s1".into(),
                },
                "failed to remove snapshot tag",
            ),
            (
                ScanCommand::ResetLatest {
                    owner: "ORG".into(),
                },
                "failed to reset latest flag",
            ),
        ];
        for (cmd, context) in cases {
            let err = run_scan(&store, cmd).unwrap_err();
            assert_eq!(err.to_string(), context);
            assert!(format!("{err:#}").contains("write failed"), "{err:#}");
        }
        assert_eq!(store.latest_scan_docs("ORG").unwrap(), first);
    }

    #[test]
    fn cve_save_rejects_unknown_version() {
        let store = RecordStore::open_in_memory().unwrap();
        let err = run_cve(
            &store,
            CveCommand::Save {
                id: "CVE-1".into(),
                cvss_version: "4.0".into(),
                score: 5.0,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("4.0"), "{err}");
        assert_eq!(store.count_cves().unwrap(), 0);
    }
}
