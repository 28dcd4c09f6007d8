//! Per-client admission control: burst blocking and usage quotas.

pub mod monitor;
pub mod usage;

pub use monitor::{AbuseMonitor, MonitorStats};
pub use usage::{UsageLedger, UsagePermit, UsageReport};
