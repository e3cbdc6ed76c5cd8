mod cve;
mod error;
mod scan_doc;
mod schema;
mod store;

pub use cve::CveRecord;
pub use error::DbError;
pub use scan_doc::ScanDoc;
pub use store::{DB_PATH_ENV, RecordStore, default_db_path};
