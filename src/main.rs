use anyhow::Result;
use monitor_hosts::{Config, Monitor, MonitorEvent, MonitorOptions, NetworkProbe, Probe, Storage};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializa o sistema de logging (tracing)
    tracing_subscriber::fmt::init();

    // Carrega a configuração (defaults + config.toml + variáveis MONITOR_*)
    let config: Config = Config::load()?;
    info!("Configuração carregada: {:?}", config);

    // Probe de rede compartilhado por todas as tasks de verificação
    let probe: Arc<dyn Probe> = Arc::new(NetworkProbe::new(config.icmp_backend));
    let storage = Storage::new(config.history_file.clone());

    let (handle, controller) =
        Monitor::spawn(MonitorOptions::from(&config), probe, Some(storage)).await;

    // Assina os eventos antes de cadastrar os hosts iniciais
    let mut events = handle.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MonitorEvent::HostUnreachable { host }) => {
                    warn!("[ALERTA] Host {} não está respondendo!", host)
                }
                Ok(MonitorEvent::TierChanged { scope, tier }) => {
                    info!("[SAÚDE] {:?} -> {}", scope, tier)
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[EVENTOS] {} eventos perdidos", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if !config.hosts.is_empty() {
        let added = handle.add_hosts(config.hosts.clone()).await?;
        info!("{} hosts da configuração cadastrados", added);
    }

    let status = handle.status().await?;
    info!(
        "Monitorando {} hosts a cada {}ms",
        status.hosts.len(),
        status.interval_ms
    );

    // Roda até Ctrl+C; o estado final é gravado no encerramento
    tokio::signal::ctrl_c().await?;
    info!("Encerrando...");
    handle.shutdown().await?;
    drop(handle);

    if let Err(e) = controller.await {
        error!("Controlador terminou com erro: {:?}", e);
    }
    listener.abort();

    Ok(())
}
