//! Monitor de alcance de hosts: probes ICMP/TCP agendados em round-robin,
//! histórico com retenção, níveis de saúde e persistência em JSON.

pub mod config;
pub mod error;
pub mod health;
pub mod history;
pub mod monitor;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{MonitorError, PersistenceError};
pub use monitor::{Monitor, MonitorHandle, MonitorOptions};
pub use probe::{NetworkProbe, Probe};
pub use storage::Storage;
pub use types::{CheckConfig, HealthTier, Host, MonitorEvent, ProbeResult, TierScope};
