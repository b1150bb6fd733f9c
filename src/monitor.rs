//! monitor.rs — Controlador único: timer, pool de probes e aplicação de resultados
//!
//! Registro, histórico, fila e níveis de saúde pertencem a uma única task
//! (`Monitor::run`). Comandos externos chegam por `mpsc` com resposta por
//! `oneshot`; os probes executam em tasks separadas, limitadas por um
//! semáforo, e devolvem o resultado por outro `mpsc`. O laço do timer nunca
//! espera um probe terminar.

use crate::config::{Config, effective_probe_timeout};
use crate::error::{MonitorError, PersistenceError};
use crate::health::{HealthAggregator, crossed_unreachable, host_tier};
use crate::history::HistoryStore;
use crate::probe::Probe;
use crate::registry::{HostRegistry, parse_host_list};
use crate::scheduler::{Scheduler, SchedulerState};
use crate::storage::{HostRecordView, PersistenceWriter, SNAPSHOT_VERSION, SnapshotView, Storage};
use crate::types::{
    CheckConfig, HistoryReport, HostStatus, MonitorEvent, MonitorStatus, ProbeResult,
};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, info, warn};

const COMMAND_CHANNEL_SIZE: usize = 64;
const RESULT_CHANNEL_SIZE: usize = 256;
const EVENT_CHANNEL_SIZE: usize = 1024;
/// Espaçamento mínimo entre gravações causadas só por resultados.
const FLUSH_SPACING: Duration = Duration::from_secs(1);

type Reply<T> = oneshot::Sender<Result<T, MonitorError>>;

/// Parâmetros de execução do controlador.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval_ms: u64,
    pub probe_timeout_ms: Option<u64>,
    pub max_concurrent_probes: usize,
    pub retention: chrono::Duration,
    pub notifications_enabled: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MonitorOptions {
    fn from(config: &Config) -> Self {
        Self {
            interval_ms: config.interval_ms,
            probe_timeout_ms: config.probe_timeout_ms,
            max_concurrent_probes: config.max_concurrent_probes,
            retention: config.retention(),
            notifications_enabled: config.notifications_enabled,
        }
    }
}

enum Command {
    AddHost {
        identity: String,
        category: Option<String>,
        check: CheckConfig,
        reply: Reply<String>,
    },
    AddHosts {
        identities: Vec<String>,
        reply: Reply<usize>,
    },
    RemoveHosts {
        identities: Vec<String>,
        reply: Reply<usize>,
    },
    RenameHost {
        old: String,
        new: String,
        reply: Reply<String>,
    },
    SetCategory {
        identities: Vec<String>,
        category: String,
        reply: Reply<()>,
    },
    SetCheckType {
        identity: String,
        check: CheckConfig,
        reply: Reply<()>,
    },
    SetInterval {
        interval_ms: u64,
        reply: Reply<()>,
    },
    Prioritize {
        identity: String,
        reply: Reply<()>,
    },
    ReorderQueue {
        order: Vec<String>,
        reply: Reply<()>,
    },
    SetNotifications {
        enabled: bool,
        reply: Reply<()>,
    },
    Status {
        reply: Reply<MonitorStatus>,
    },
    History {
        identity: String,
        reply: Reply<HistoryReport>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Resultado devolvido por uma task de probe.
struct ProbeOutcome {
    host: String,
    ticket: u64,
    result: ProbeResult,
}

/// Ponta de comando usada pela camada de apresentação.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<MonitorEvent>,
}

impl MonitorHandle {
    /// Recebe os eventos publicados a partir de agora.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| MonitorError::Stopped)?;
        rx.await.map_err(|_| MonitorError::Stopped)?
    }

    pub async fn add_host(
        &self,
        identity: impl Into<String>,
        category: Option<String>,
    ) -> Result<String, MonitorError> {
        self.add_host_with_check(identity, category, CheckConfig::Icmp)
            .await
    }

    pub async fn add_host_with_check(
        &self,
        identity: impl Into<String>,
        category: Option<String>,
        check: CheckConfig,
    ) -> Result<String, MonitorError> {
        let identity = identity.into();
        self.request(|reply| Command::AddHost {
            identity,
            category,
            check,
            reply,
        })
        .await
    }

    /// Cadastra vários hosts, ignorando duplicados. Retorna quantos entraram.
    pub async fn add_hosts(&self, identities: Vec<String>) -> Result<usize, MonitorError> {
        self.request(|reply| Command::AddHosts { identities, reply })
            .await
    }

    /// Importa um arquivo texto com um host por linha.
    pub async fn import_hosts(&self, path: impl AsRef<Path>) -> Result<usize, MonitorError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PersistenceError::io(path, e))?;
        self.add_hosts(parse_host_list(&text)).await
    }

    pub async fn remove_hosts(&self, identities: Vec<String>) -> Result<usize, MonitorError> {
        self.request(|reply| Command::RemoveHosts { identities, reply })
            .await
    }

    pub async fn rename_host(
        &self,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Result<String, MonitorError> {
        let (old, new) = (old.into(), new.into());
        self.request(|reply| Command::RenameHost { old, new, reply })
            .await
    }

    pub async fn set_category(
        &self,
        identities: Vec<String>,
        category: impl Into<String>,
    ) -> Result<(), MonitorError> {
        let category = category.into();
        self.request(|reply| Command::SetCategory {
            identities,
            category,
            reply,
        })
        .await
    }

    pub async fn set_check_type(
        &self,
        identity: impl Into<String>,
        check: CheckConfig,
    ) -> Result<(), MonitorError> {
        let identity = identity.into();
        self.request(|reply| Command::SetCheckType {
            identity,
            check,
            reply,
        })
        .await
    }

    pub async fn set_interval(&self, interval_ms: u64) -> Result<(), MonitorError> {
        self.request(|reply| Command::SetInterval { interval_ms, reply })
            .await
    }

    pub async fn prioritize(&self, identity: impl Into<String>) -> Result<(), MonitorError> {
        let identity = identity.into();
        self.request(|reply| Command::Prioritize { identity, reply })
            .await
    }

    pub async fn reorder_queue(&self, order: Vec<String>) -> Result<(), MonitorError> {
        self.request(|reply| Command::ReorderQueue { order, reply })
            .await
    }

    pub async fn set_notifications(&self, enabled: bool) -> Result<(), MonitorError> {
        self.request(|reply| Command::SetNotifications { enabled, reply })
            .await
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn history(&self, identity: impl Into<String>) -> Result<HistoryReport, MonitorError> {
        let identity = identity.into();
        self.request(|reply| Command::History { identity, reply })
            .await
    }

    /// Grava o estado final e encerra o controlador.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Estado do controlador. Só existe dentro da task de `run`.
pub struct Monitor {
    registry: HostRegistry,
    history: HistoryStore,
    scheduler: Scheduler,
    health: HealthAggregator,
    probe: Arc<dyn Probe>,
    permits: Arc<Semaphore>,
    results_tx: mpsc::Sender<ProbeOutcome>,
    events: broadcast::Sender<MonitorEvent>,
    probe_timeout_ms: Option<u64>,
    notifications_enabled: bool,
    writer: Option<PersistenceWriter>,
    dirty: bool,
    last_flush: Option<Instant>,
    restart_timer: bool,
}

impl Monitor {
    /// Carrega o arquivo (se houver), monta o estado e inicia o controlador.
    ///
    /// Falha ao carregar nunca impede a inicialização: segue com estado vazio.
    pub async fn spawn(
        options: MonitorOptions,
        probe: Arc<dyn Probe>,
        storage: Option<Storage>,
    ) -> (MonitorHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (results_tx, results_rx) = mpsc::channel(RESULT_CHANNEL_SIZE);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let mut monitor = Monitor {
            registry: HostRegistry::new(),
            history: HistoryStore::new(options.retention),
            scheduler: Scheduler::new(Duration::from_millis(options.interval_ms)),
            health: HealthAggregator::new(),
            probe,
            permits: Arc::new(Semaphore::new(options.max_concurrent_probes.max(1))),
            results_tx,
            events: events.clone(),
            probe_timeout_ms: options.probe_timeout_ms,
            notifications_enabled: options.notifications_enabled,
            writer: None,
            dirty: false,
            last_flush: None,
            restart_timer: false,
        };

        if let Some(storage) = storage {
            monitor.restore(&storage).await;
            monitor.writer = Some(storage.spawn_writer());
        }
        monitor.scheduler.start();

        let handle = tokio::spawn(monitor.run(commands_rx, results_rx));
        (
            MonitorHandle {
                commands: commands_tx,
                events,
            },
            handle,
        )
    }

    async fn restore(&mut self, storage: &Storage) {
        let snapshot = match storage.load().await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                info!(
                    "[STORAGE] Nenhum histórico em {}, iniciando vazio.",
                    storage.path().display()
                );
                return;
            }
            Err(e) => {
                warn!("[STORAGE] Histórico ignorado: {}", e);
                return;
            }
        };

        if let Some(interval_ms) = snapshot.interval_ms {
            if let Err(e) = self.scheduler.set_interval(interval_ms) {
                warn!("[STORAGE] Intervalo salvo ignorado: {}", e);
            }
        }
        if let Some(enabled) = snapshot.notifications_enabled {
            self.notifications_enabled = enabled;
        }

        let now = Utc::now();
        for record in &snapshot.hosts {
            let host = record.host();
            let identity = match self
                .registry
                .add(&host.identity, Some(host.category.as_str()), host.check)
            {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("[STORAGE] Host {:?} ignorado: {}", record.identity, e);
                    continue;
                }
            };
            let kept = self.history.restore(&identity, record.results(), now);
            self.health
                .update(&identity, host_tier(self.history.get(&identity)));
            debug!("[HOST {}] {} registros carregados.", identity, kept);
        }
        self.scheduler.membership_changed(&self.registry.identities());
        info!(
            "[STORAGE] {} hosts carregados de {}.",
            self.registry.len(),
            storage.path().display()
        );
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut results: mpsc::Receiver<ProbeOutcome>,
    ) {
        let mut ticker: Option<Interval> = None;
        self.sync_ticker(&mut ticker);

        loop {
            let mut urgent = false;
            tokio::select! {
                Some(outcome) = results.recv() => self.apply_result(outcome),
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle(command).await {
                            break;
                        }
                        urgent = true;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                _ = next_tick(&mut ticker) => self.tick(),
            }
            self.sync_ticker(&mut ticker);
            self.flush(urgent);
        }
        info!("[SCHEDULER] Controlador encerrado.");
    }

    /// Mantém o timer coerente com o estado do scheduler.
    fn sync_ticker(&mut self, ticker: &mut Option<Interval>) {
        match self.scheduler.state() {
            SchedulerState::Idle => {
                if ticker.take().is_some() {
                    info!("[SCHEDULER] Timer parado.");
                }
            }
            SchedulerState::Running => {
                let period = self.scheduler.interval();
                if ticker.is_none() {
                    *ticker = Some(new_ticker(Instant::now(), period));
                } else if self.restart_timer {
                    *ticker = Some(new_ticker(Instant::now() + period, period));
                }
            }
        }
        self.restart_timer = false;
    }

    /// Aplica um comando. Retorna true quando o controlador deve parar.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::AddHost {
                identity,
                category,
                check,
                reply,
            } => {
                let _ = reply.send(self.add_host(&identity, category.as_deref(), check));
            }
            Command::AddHosts { identities, reply } => {
                let _ = reply.send(Ok(self.add_hosts(&identities)));
            }
            Command::RemoveHosts { identities, reply } => {
                let _ = reply.send(self.remove_hosts(&identities));
            }
            Command::RenameHost { old, new, reply } => {
                let _ = reply.send(self.rename_host(&old, &new));
            }
            Command::SetCategory {
                identities,
                category,
                reply,
            } => {
                let _ = reply.send(self.set_category(&identities, &category));
            }
            Command::SetCheckType {
                identity,
                check,
                reply,
            } => {
                let _ = reply.send(self.set_check_type(&identity, check));
            }
            Command::SetInterval { interval_ms, reply } => {
                let _ = reply.send(self.set_interval(interval_ms));
            }
            Command::Prioritize { identity, reply } => {
                let _ = reply.send(self.prioritize(&identity));
            }
            Command::ReorderQueue { order, reply } => {
                let _ = reply.send(self.reorder_queue(&order));
            }
            Command::SetNotifications { enabled, reply } => {
                self.notifications_enabled = enabled;
                self.dirty = true;
                let _ = reply.send(Ok(()));
            }
            Command::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
            Command::History { identity, reply } => {
                let _ = reply.send(self.history_report(&identity));
            }
            Command::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(Ok(()));
                return true;
            }
        }
        false
    }

    fn add_host(
        &mut self,
        identity: &str,
        category: Option<&str>,
        check: CheckConfig,
    ) -> Result<String, MonitorError> {
        let identity = self.registry.add(identity, category, check)?;
        self.history.insert_host(&identity);
        self.membership_changed();
        info!("[HOST {}] Cadastrado ({}).", identity, check);
        Ok(identity)
    }

    fn add_hosts(&mut self, identities: &[String]) -> usize {
        let mut added = 0;
        for identity in identities {
            match self.registry.add(identity, None, CheckConfig::Icmp) {
                Ok(identity) => {
                    self.history.insert_host(&identity);
                    added += 1;
                }
                Err(e) => debug!("[HOST {}] Não importado: {}", identity, e),
            }
        }
        if added > 0 {
            self.membership_changed();
            info!("[SCHEDULER] {} hosts importados.", added);
        }
        added
    }

    /// Remove todos ou nenhum: qualquer host desconhecido cancela a operação.
    fn remove_hosts(&mut self, identities: &[String]) -> Result<usize, MonitorError> {
        self.ensure_known(identities)?;
        let mut removed = 0;
        for identity in identities {
            if self.registry.remove(identity).is_ok() {
                self.history.remove(identity);
                let events = self.health.forget(identity);
                self.publish_all(events);
                info!("[HOST {}] Removido.", identity);
                removed += 1;
            }
        }
        self.membership_changed();
        Ok(removed)
    }

    /// Registro, histórico, fila e saúde mudam no mesmo passo; um probe
    /// pendente para o nome antigo vira obsoleto e seu resultado é descartado.
    fn rename_host(&mut self, old: &str, new: &str) -> Result<String, MonitorError> {
        let new = self.registry.rename(old, new)?;
        if new == old {
            return Ok(new);
        }
        if self.history.rename(old, &new).is_err() {
            self.history.insert_host(&new);
        }
        self.scheduler.rename(old, &new);
        self.health.rename(old, &new);
        self.membership_changed();
        info!("[HOST {}] Renomeado para {}.", old, new);
        Ok(new)
    }

    fn set_category(&mut self, identities: &[String], category: &str) -> Result<(), MonitorError> {
        self.ensure_known(identities)?;
        for identity in identities {
            self.registry.set_category(identity, category)?;
        }
        self.dirty = true;
        Ok(())
    }

    fn set_check_type(&mut self, identity: &str, check: CheckConfig) -> Result<(), MonitorError> {
        self.registry.set_check_config(identity, check)?;
        info!("[HOST {}] Verificação alterada para {}.", identity, check);
        self.dirty = true;
        Ok(())
    }

    fn set_interval(&mut self, interval_ms: u64) -> Result<(), MonitorError> {
        self.restart_timer = self.scheduler.set_interval(interval_ms)?;
        info!("[SCHEDULER] Intervalo alterado para {}ms.", interval_ms);
        self.dirty = true;
        Ok(())
    }

    /// Marca o host para o próximo disparo e já dispara, reiniciando a
    /// cadência do timer a partir de agora. Com probe pendente o host só
    /// espera o próximo tick; o timer não é tocado.
    fn prioritize(&mut self, identity: &str) -> Result<(), MonitorError> {
        self.scheduler.prioritize(identity)?;
        if self.scheduler.state() == SchedulerState::Running
            && !self.scheduler.is_in_flight(identity)
        {
            self.tick();
            self.restart_timer = true;
        }
        Ok(())
    }

    fn reorder_queue(&mut self, order: &[String]) -> Result<(), MonitorError> {
        self.registry.reorder(order)?;
        self.scheduler.reorder(order)?;
        self.dirty = true;
        Ok(())
    }

    fn ensure_known(&self, identities: &[String]) -> Result<(), MonitorError> {
        match identities.iter().find(|id| !self.registry.contains(id)) {
            Some(unknown) => Err(MonitorError::UnknownHost(unknown.clone())),
            None => Ok(()),
        }
    }

    fn membership_changed(&mut self) {
        if let Some(state) = self
            .scheduler
            .membership_changed(&self.registry.identities())
        {
            info!("[SCHEDULER] Estado: {:?}", state);
        }
        self.dirty = true;
    }

    fn probe_timeout(&self) -> Duration {
        effective_probe_timeout(self.scheduler.interval_ms(), self.probe_timeout_ms)
    }

    /// Dispara o próximo probe sem esperar por ele.
    fn tick(&mut self) {
        let Some(dispatch) = self.scheduler.tick() else {
            return;
        };
        let Some(host) = self.registry.get(&dispatch.host) else {
            error!(
                "[HOST {}] Na fila mas fora do registro, disparo cancelado.",
                dispatch.host
            );
            self.scheduler.on_probe_result(&dispatch.host, dispatch.ticket);
            return;
        };
        let check = host.check;
        let wait = self.probe_timeout();
        debug!(
            "[HOST {}] Disparando probe {} (timeout {:?}{}).",
            dispatch.host,
            check,
            wait,
            if dispatch.prioritized { ", prioritário" } else { "" }
        );
        self.publish(MonitorEvent::ProbeDispatched {
            host: dispatch.host.clone(),
        });

        let probe = Arc::clone(&self.probe);
        let permits = Arc::clone(&self.permits);
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let success = run_probe(probe, permits, &dispatch.host, check, wait).await;
            let outcome = ProbeOutcome {
                host: dispatch.host,
                ticket: dispatch.ticket,
                result: ProbeResult::new(Utc::now(), success),
            };
            // o controlador só some no encerramento; aí o resultado não importa
            let _ = results.send(outcome).await;
        });
    }

    fn apply_result(&mut self, outcome: ProbeOutcome) {
        let ProbeOutcome {
            host,
            ticket,
            result,
        } = outcome;
        if !self.scheduler.on_probe_result(&host, ticket) || !self.registry.contains(&host) {
            debug!(
                "[HOST {}] Resultado descartado: host removido ou renomeado.",
                host
            );
            return;
        }

        let recorded = match self.history.record(&host, result) {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!("[HOST {}] Resultado não registrado: {}", host, e);
                return;
            }
        };
        let history = self.history.get(&host);
        let timestamp = history
            .and_then(|h| h.last())
            .map_or(result.timestamp, |r| r.timestamp);
        let tier = host_tier(history);
        debug!(
            "[HOST {}] success={} falhas_consecutivas={}",
            host, result.success, recorded.consecutive_failures
        );

        self.publish(MonitorEvent::ProbeRecorded {
            host: host.clone(),
            success: result.success,
            timestamp,
            consecutive_failures: recorded.consecutive_failures,
        });

        if crossed_unreachable(&recorded) {
            warn!(
                "[HOST {}] Host não está respondendo ({} falhas consecutivas).",
                host, recorded.consecutive_failures
            );
            if self.notifications_enabled {
                self.publish(MonitorEvent::HostUnreachable { host: host.clone() });
            }
        }

        let events = self.health.update(&host, tier);
        for event in &events {
            if let MonitorEvent::TierChanged { scope, tier } = event {
                info!("[SAÚDE] {:?} agora {}.", scope, tier);
            }
        }
        self.publish_all(events);
        self.dirty = true;
    }

    fn publish(&self, event: MonitorEvent) {
        // sem assinantes o envio falha; eventos não são obrigatórios
        let _ = self.events.send(event);
    }

    fn publish_all(&self, events: Vec<MonitorEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    fn status(&self) -> MonitorStatus {
        let hosts = self
            .registry
            .list()
            .iter()
            .map(|host| {
                let history = self.history.get(&host.identity);
                HostStatus {
                    host: host.clone(),
                    tier: self.health.status(&host.identity),
                    consecutive_failures: history.map_or(0, |h| h.consecutive_failures()),
                    session_success: history.map_or(0, |h| h.session_success()),
                    session_failure: history.map_or(0, |h| h.session_failure()),
                    records: history.map_or(0, |h| h.records().len()),
                    last_result: history.and_then(|h| h.last().copied()),
                    probing: self.scheduler.is_in_flight(&host.identity),
                }
            })
            .collect();
        MonitorStatus {
            hosts,
            global: self.health.global(),
            interval_ms: self.scheduler.interval_ms(),
            state: self.scheduler.state(),
            queue: self.scheduler.queue().to_vec(),
            current_probe: self.scheduler.current().map(str::to_string),
            categories: self.registry.categories(),
            notifications_enabled: self.notifications_enabled,
        }
    }

    fn history_report(&self, identity: &str) -> Result<HistoryReport, MonitorError> {
        let history = self
            .history
            .get(identity)
            .ok_or_else(|| MonitorError::UnknownHost(identity.to_string()))?;
        Ok(HistoryReport {
            host: identity.to_string(),
            records: history.records().iter().copied().collect(),
            consecutive_failures: history.consecutive_failures(),
            session_success: history.session_success(),
            session_failure: history.session_failure(),
        })
    }

    fn snapshot(&self) -> SnapshotView<'_> {
        SnapshotView {
            version: SNAPSHOT_VERSION,
            interval_ms: self.scheduler.interval_ms(),
            notifications_enabled: self.notifications_enabled,
            hosts: self
                .registry
                .list()
                .iter()
                .map(|host| HostRecordView {
                    identity: &host.identity,
                    category: &host.category,
                    check: host.check,
                    records: self.history.get(&host.identity).map(|h| h.records()),
                })
                .collect(),
        }
    }

    /// Envia o estado atual para a task gravadora, se houve mudança.
    ///
    /// Resultados de probe gravam no máximo uma vez a cada
    /// `FLUSH_SPACING`; comandos (`force`) gravam na hora.
    fn flush(&mut self, force: bool) {
        if !self.dirty {
            return;
        }
        let now = Instant::now();
        if !force
            && self
                .last_flush
                .is_some_and(|at| now.duration_since(at) < FLUSH_SPACING)
        {
            return;
        }
        self.dirty = false;
        self.last_flush = Some(now);
        let Some(writer) = &self.writer else {
            return;
        };
        match self.snapshot().encode() {
            Ok(bytes) => writer.submit(bytes),
            Err(e) => warn!("[STORAGE] Falha ao serializar estado: {}", e),
        }
    }

    async fn shutdown(&mut self) {
        info!("[SCHEDULER] Encerrando, gravando estado final.");
        self.dirty = true;
        self.flush(true);
        if let Some(writer) = self.writer.take() {
            writer.finish().await;
        }
    }
}

fn new_ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Executa um probe dentro do pool. Pânico ou estouro do timeout viram falha.
async fn run_probe(
    probe: Arc<dyn Probe>,
    permits: Arc<Semaphore>,
    host: &str,
    check: CheckConfig,
    wait: Duration,
) -> bool {
    let Ok(_permit) = permits.acquire_owned().await else {
        return false;
    };
    let target = host.to_string();
    let mut task = tokio::spawn(async move { probe.probe(&target, &check, wait).await });
    match timeout(wait, &mut task).await {
        Ok(Ok(success)) => success,
        Ok(Err(e)) => {
            warn!("[HOST {}] Probe abortou: {}", host, e);
            false
        }
        Err(_) => {
            task.abort();
            debug!("[HOST {}] Probe excedeu {:?}, abortado.", host, wait);
            false
        }
    }
}
