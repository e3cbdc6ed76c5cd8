use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cyhy_db::DB_PATH_ENV;

/// cyhy: inspect and update the cyber hygiene record store
#[derive(Parser, Debug)]
#[command(name = "cyhy", version, about = "CVE and scan document record store")]
pub struct Args {
    /// Increase verbosity level (use -v or -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (default: ~/.cyhy/cyhy.db)
    #[arg(long = "db", value_name = "PATH", env = DB_PATH_ENV, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// CVE records
    #[command(subcommand)]
    Cve(CveCommand),
    /// Scan documents
    #[command(subcommand)]
    Scan(ScanCommand),
}

#[derive(Subcommand, Debug)]
pub enum CveCommand {
    /// Insert or update a CVE; severity is recomputed on save
    Save {
        #[arg(long)]
        id: String,
        /// CVSS version: 2.0, 3.0 or 3.1
        #[arg(long = "cvss-version", value_name = "VERSION")]
        cvss_version: String,
        /// CVSS base score (0.0-10.0)
        #[arg(long, value_name = "SCORE", allow_negative_numbers = true)]
        score: f64,
    },
    /// Print one CVE as JSON
    Show { id: String },
    /// List CVEs at or above a severity (1-4)
    List {
        #[arg(long = "min-severity", default_value = "1", value_parser = clap::value_parser!(u8).range(1..=4))]
        min_severity: u8,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScanCommand {
    /// Record a new latest scan document for an address
    Add {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        source: String,
    },
    /// Print one scan document as JSON
    Show { id: String },
    /// Tag the latest documents of the given owners with a snapshot id
    TagLatest {
        #[arg(long, value_name = "SNAPSHOT")]
        snapshot: String,
        #[arg(required = true, num_args = 1..)]
        owners: Vec<String>,
    },
    /// Remove a snapshot tag from every document
    RemoveTag { snapshot: String },
    /// Clear the latest flag on all documents of an owner
    ResetLatest { owner: String },
}
