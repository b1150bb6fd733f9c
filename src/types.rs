use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MonitorError;
use crate::scheduler::SchedulerState;

/// Categoria atribuída a hosts cadastrados sem categoria explícita.
pub const DEFAULT_CATEGORY: &str = "Default";

/// Tipo de verificação de alcance (a porta só existe no modo TCP).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckConfig {
    #[default]
    Icmp,
    Tcp { port: u16 },
}

impl CheckConfig {
    /// Porta TCP deve estar na faixa 1-65535.
    pub fn validate(&self) -> Result<(), MonitorError> {
        match *self {
            CheckConfig::Tcp { port: 0 } => Err(MonitorError::InvalidPort(0)),
            _ => Ok(()),
        }
    }

    pub fn port(&self) -> Option<u16> {
        match *self {
            CheckConfig::Icmp => None,
            CheckConfig::Tcp { port } => Some(port),
        }
    }
}

impl fmt::Display for CheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckConfig::Icmp => write!(f, "ICMP"),
            CheckConfig::Tcp { port } => write!(f, "TCP:{port}"),
        }
    }
}

/// Host monitorado (a identidade é a chave única).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub identity: String,
    pub category: String,
    pub check: CheckConfig,
}

impl Host {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            category: DEFAULT_CATEGORY.to_string(),
            check: CheckConfig::Icmp,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_check(mut self, check: CheckConfig) -> Self {
        self.check = check;
        self
    }
}

/// Resultado imutável de uma verificação.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl ProbeResult {
    pub fn new(timestamp: DateTime<Utc>, success: bool) -> Self {
        Self { timestamp, success }
    }
}

/// Nível de saúde derivado. A ordem das variantes é a ordem de gravidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Down,
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthTier::Healthy => "healthy",
            HealthTier::Degraded => "degraded",
            HealthTier::Down => "down",
        };
        f.write_str(label)
    }
}

/// Escopo de uma mudança de nível de saúde.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierScope {
    Host(String),
    Global,
}

/// Eventos publicados para a camada de apresentação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// Um probe foi disparado para o host (marcador "verificando agora").
    ProbeDispatched { host: String },
    /// Resultado aplicado ao histórico.
    ProbeRecorded {
        host: String,
        success: bool,
        timestamp: DateTime<Utc>,
        consecutive_failures: u32,
    },
    TierChanged { scope: TierScope, tier: HealthTier },
    /// Alerta único: o host acabou de atingir duas falhas seguidas.
    HostUnreachable { host: String },
}

/// Visão de um host para consulta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostStatus {
    pub host: Host,
    pub tier: HealthTier,
    pub consecutive_failures: u32,
    pub session_success: u64,
    pub session_failure: u64,
    pub records: usize,
    pub last_result: Option<ProbeResult>,
    pub probing: bool,
}

/// Visão completa do monitor, na ordem persistida dos hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub hosts: Vec<HostStatus>,
    pub global: HealthTier,
    pub interval_ms: u64,
    pub state: SchedulerState,
    pub queue: Vec<String>,
    /// Host disparado mais recentemente ainda sem resultado.
    pub current_probe: Option<String>,
    /// Categorias em uso, ordenadas e sem repetição.
    pub categories: Vec<String>,
    pub notifications_enabled: bool,
}

/// Histórico completo de um host para consulta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub host: String,
    pub records: Vec<ProbeResult>,
    pub consecutive_failures: u32,
    pub session_success: u64,
    pub session_failure: u64,
}
