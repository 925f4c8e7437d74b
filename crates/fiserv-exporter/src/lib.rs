//! fiserv-exporter: scheduled CSV export of accounts and transactions from
//! Fiserv-hosted online banking.

pub mod config;
pub mod daemon;
pub mod export;
pub mod logging;
pub mod schedule;
pub mod status;

pub use config::{ExporterConfig, ResolvedConfig};
pub use export::CsvExporter;
pub use schedule::DailySchedule;
