//! Patient treatment record service
//!
//! Patient and treatment records backed by SQLite, served over HTTP and
//! fed by NATS feedback messages. Status snapshots are immutable and
//! deduplicated by content; patient updates are sparse patches that
//! stamp a revision time; treatment feedback is an append-only ledger
//! folded at read time into the treatment view.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod messages;
pub mod models;
pub mod nats;
pub mod service;

pub use config::Config;
pub use db::RecordDb;
pub use error::ServiceError;
pub use service::RecordService;
