use ::config as config_crate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Menor intervalo entre ticks aceito (ms).
pub const MIN_INTERVAL_MS: u64 = 100;
/// Maior intervalo entre ticks aceito (ms).
pub const MAX_INTERVAL_MS: u64 = 5000;

/// Mecanismo usado para o probe ICMP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcmpBackend {
    /// Socket ICMP via surge-ping.
    #[default]
    Socket,
    /// Comando `ping` do sistema.
    Command,
}

/// Configuração operacional do sistema.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Intervalo entre ticks do scheduler, em milissegundos.
    pub interval_ms: u64,
    /// Timeout de cada probe em milissegundos. Ausente = igual ao intervalo.
    pub probe_timeout_ms: Option<u64>,
    /// Quantidade máxima de probes executando ao mesmo tempo.
    pub max_concurrent_probes: usize,
    /// Janela de retenção do histórico, em horas.
    pub retention_hours: u64,
    /// Arquivo JSON com hosts e histórico.
    pub history_file: PathBuf,
    pub icmp_backend: IcmpBackend,
    /// Dispara alertas de host inacessível.
    pub notifications_enabled: bool,
    /// Hosts cadastrados na inicialização caso ainda não existam.
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            probe_timeout_ms: None,
            max_concurrent_probes: 10,
            retention_hours: 48,
            history_file: PathBuf::from("historico_hosts.json"),
            icmp_backend: IcmpBackend::Socket,
            notifications_enabled: true,
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Lê `config.*` (opcional) e variáveis `MONITOR_*` sobre os valores padrão.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Config::default();
        let settings = config_crate::Config::builder()
            .set_default("interval_ms", defaults.interval_ms)?
            .set_default("max_concurrent_probes", defaults.max_concurrent_probes as u64)?
            .set_default("retention_hours", defaults.retention_hours)?
            .set_default(
                "history_file",
                defaults.history_file.to_string_lossy().into_owned(),
            )?
            .set_default("icmp_backend", "socket")?
            .set_default("notifications_enabled", defaults.notifications_enabled)?
            .add_source(config_crate::File::with_name("config").required(false))
            .add_source(config_crate::Environment::with_prefix("MONITOR"))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        if let Err(msg) = config.validate() {
            anyhow::bail!("configuração inválida: {msg}");
        }
        Ok(config)
    }

    /// Validação customizada
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(format!(
                "interval_ms deve estar entre {MIN_INTERVAL_MS} e {MAX_INTERVAL_MS}"
            ));
        }
        if self.probe_timeout_ms == Some(0) {
            return Err("probe_timeout_ms deve ser maior que zero".into());
        }
        if self.max_concurrent_probes == 0 {
            return Err("max_concurrent_probes deve ser maior que zero".into());
        }
        if self.retention_hours == 0 {
            return Err("retention_hours deve ser maior que zero".into());
        }
        Ok(())
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }
}

/// Timeout efetivo de um probe: o configurado (ou o próprio intervalo), nunca
/// maior que o intervalo.
pub fn effective_probe_timeout(interval_ms: u64, probe_timeout_ms: Option<u64>) -> Duration {
    let ms = probe_timeout_ms.unwrap_or(interval_ms).min(interval_ms);
    Duration::from_millis(ms.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval_ms, 500);
        assert_eq!(config.retention(), chrono::Duration::hours(48));
    }

    #[test]
    fn interval_out_of_range_is_rejected() {
        let config = Config {
            interval_ms: 50,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            interval_ms: 5001,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_pool_is_rejected() {
        let config = Config {
            max_concurrent_probes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn probe_timeout_never_exceeds_interval() {
        assert_eq!(
            effective_probe_timeout(1000, None),
            Duration::from_millis(1000)
        );
        assert_eq!(
            effective_probe_timeout(1000, Some(300)),
            Duration::from_millis(300)
        );
        assert_eq!(
            effective_probe_timeout(200, Some(3000)),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn icmp_backend_deserializes_lowercase() {
        let backend: IcmpBackend = serde_json::from_str("\"command\"").unwrap();
        assert_eq!(backend, IcmpBackend::Command);
    }
}
