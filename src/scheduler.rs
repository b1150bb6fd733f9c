// src/scheduler.rs

use crate::config::{MAX_INTERVAL_MS, MIN_INTERVAL_MS};
use crate::error::MonitorError;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Enum de estados do scheduler: sem hosts ou com timer ativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Probe a ser disparado neste tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub host: String,
    /// Identifica este disparo; resultados com ticket antigo são descartados.
    pub ticket: u64,
    /// Disparo consumiu a prioridade pendente.
    pub prioritized: bool,
}

/// Fila round-robin com prioridade de uma única vez e no máximo um probe
/// pendente por host.
///
/// Não faz I/O nem mede tempo: quem dirige o timer é o controlador
/// (`monitor.rs`), que chama `tick` a cada intervalo.
#[derive(Debug, Clone)]
pub struct Scheduler {
    queue: Vec<String>,
    cursor: usize,
    priority: Option<String>,
    in_flight: HashMap<String, u64>,
    next_ticket: u64,
    state: SchedulerState,
    interval: Duration,
    current: Option<String>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: Vec::new(),
            cursor: 0,
            priority: None,
            in_flight: HashMap::new(),
            next_ticket: 1,
            state: SchedulerState::Idle,
            interval,
            current: None,
        }
    }

    /// Inicia o ciclo se houver hosts. Retorna true se houve transição.
    pub fn start(&mut self) -> bool {
        if self.queue.is_empty() || self.state == SchedulerState::Running {
            return false;
        }
        info!(
            "[SCHEDULER] Iniciando ciclo com {} hosts a cada {:?}.",
            self.queue.len(),
            self.interval
        );
        self.state = SchedulerState::Running;
        true
    }

    /// Escolhe o próximo host e registra o probe como pendente.
    ///
    /// A prioridade pendente vence o cursor sem movê-lo. Hosts com probe ainda
    /// pendente são pulados neste tick (não ficam enfileirados).
    pub fn tick(&mut self) -> Option<Dispatch> {
        if self.queue.is_empty() {
            return None;
        }

        if let Some(host) = self.priority.clone() {
            if self.in_flight.contains_key(&host) {
                debug!(
                    "[HOST {}] Prioridade mantida: probe anterior ainda pendente.",
                    host
                );
            } else {
                self.priority = None;
                return Some(self.dispatch(host, true));
            }
        }

        let len = self.queue.len();
        for offset in 0..len {
            let index = (self.cursor + offset) % len;
            if self.in_flight.contains_key(&self.queue[index]) {
                debug!(
                    "[HOST {}] Probe anterior ainda pendente, disparo ignorado.",
                    self.queue[index]
                );
                continue;
            }
            let host = self.queue[index].clone();
            self.cursor = (index + 1) % len;
            return Some(self.dispatch(host, false));
        }

        warn!(
            "[SCHEDULER] Todos os {} hosts com probe pendente; nenhum disparo neste tick.",
            len
        );
        None
    }

    fn dispatch(&mut self, host: String, prioritized: bool) -> Dispatch {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(host.clone(), ticket);
        self.current = Some(host.clone());
        Dispatch {
            host,
            ticket,
            prioritized,
        }
    }

    /// Libera o host para um novo disparo. Retorna false para resultados
    /// obsoletos (host removido, renomeado ou ticket diferente).
    pub fn on_probe_result(&mut self, host: &str, ticket: u64) -> bool {
        if self.in_flight.get(host) != Some(&ticket) {
            return false;
        }
        self.in_flight.remove(host);
        if self.current.as_deref() == Some(host) {
            self.current = None;
        }
        true
    }

    /// Atualiza o período. Retorna true se o timer precisa ser reiniciado.
    pub fn set_interval(&mut self, interval_ms: u64) -> Result<bool, MonitorError> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(MonitorError::InvalidInterval(interval_ms));
        }
        self.interval = Duration::from_millis(interval_ms);
        Ok(self.state == SchedulerState::Running)
    }

    pub fn prioritize(&mut self, host: &str) -> Result<(), MonitorError> {
        if !self.queue.iter().any(|h| h == host) {
            return Err(MonitorError::UnknownHost(host.to_string()));
        }
        self.priority = Some(host.to_string());
        Ok(())
    }

    /// Reconstroi a fila a partir das identidades do registro.
    ///
    /// Sobreviventes mantêm a ordem relativa, novos vão para o fim. Retorna o
    /// novo estado quando há transição.
    pub fn membership_changed(&mut self, identities: &[String]) -> Option<SchedulerState> {
        let was_empty = self.queue.is_empty();

        let next = self.queue.get(self.cursor).cloned();
        let survivors_before_cursor = self.queue[..self.cursor.min(self.queue.len())]
            .iter()
            .filter(|h| identities.contains(h))
            .count();

        let mut queue: Vec<String> = self
            .queue
            .iter()
            .filter(|h| identities.contains(h))
            .cloned()
            .collect();
        for identity in identities {
            if !queue.contains(identity) {
                queue.push(identity.clone());
            }
        }
        self.queue = queue;

        self.cursor = match next.and_then(|n| self.queue.iter().position(|h| *h == n)) {
            Some(index) => index,
            None if self.queue.is_empty() => 0,
            None => survivors_before_cursor % self.queue.len(),
        };

        self.in_flight.retain(|host, _| identities.contains(host));
        if self.priority.as_ref().is_some_and(|p| !identities.contains(p)) {
            self.priority = None;
        }
        if self.current.as_ref().is_some_and(|c| !identities.contains(c)) {
            self.current = None;
        }

        if self.queue.is_empty() && self.state == SchedulerState::Running {
            info!("[SCHEDULER] Nenhum host restante, parando ciclo.");
            self.state = SchedulerState::Idle;
            return Some(SchedulerState::Idle);
        }
        if was_empty && !self.queue.is_empty() && self.state == SchedulerState::Idle {
            self.start();
            return Some(SchedulerState::Running);
        }
        None
    }

    /// Troca a identidade no lugar. Probe pendente para `old` fica obsoleto.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(slot) = self.queue.iter_mut().find(|h| h.as_str() == old) {
            *slot = new.to_string();
        }
        if self.priority.as_deref() == Some(old) {
            self.priority = Some(new.to_string());
        }
        self.in_flight.remove(old);
        if self.current.as_deref() == Some(old) {
            self.current = None;
        }
    }

    /// Reordena a fila: listados primeiro, demais na ordem atual. O cursor
    /// continua apontando para o mesmo próximo host.
    pub fn reorder(&mut self, order: &[String]) -> Result<(), MonitorError> {
        if let Some(unknown) = order.iter().find(|h| !self.queue.contains(h)) {
            return Err(MonitorError::UnknownHost(unknown.clone()));
        }
        let next = self.queue.get(self.cursor).cloned();
        let mut queue: Vec<String> = Vec::with_capacity(self.queue.len());
        for host in order {
            if !queue.contains(host) {
                queue.push(host.clone());
            }
        }
        for host in &self.queue {
            if !queue.contains(host) {
                queue.push(host.clone());
            }
        }
        self.queue = queue;
        self.cursor = next
            .and_then(|n| self.queue.iter().position(|h| *h == n))
            .unwrap_or(0);
        Ok(())
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    pub fn pending_priority(&self) -> Option<&str> {
        self.priority.as_deref()
    }

    /// Último host disparado cujo resultado ainda não chegou.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_in_flight(&self, host: &str) -> bool {
        self.in_flight.contains_key(host)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(hosts: &[&str]) -> Vec<String> {
        hosts.iter().map(|h| h.to_string()).collect()
    }

    fn scheduler(hosts: &[&str]) -> Scheduler {
        let mut scheduler = Scheduler::new(Duration::from_millis(1000));
        scheduler.membership_changed(&ids(hosts));
        scheduler
    }

    fn complete(scheduler: &mut Scheduler, dispatch: &Dispatch) {
        assert!(scheduler.on_probe_result(&dispatch.host, dispatch.ticket));
    }

    #[test]
    fn empty_queue_is_idle_and_tick_is_noop() {
        let mut scheduler = Scheduler::new(Duration::from_millis(500));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.start());
        assert!(scheduler.tick().is_none());
    }

    #[test]
    fn round_robin_wraps() {
        let mut scheduler = scheduler(&["web", "db"]);
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let order: Vec<String> = (0..5)
            .map(|_| {
                let d = scheduler.tick().unwrap();
                complete(&mut scheduler, &d);
                d.host
            })
            .collect();
        assert_eq!(order, ids(&["web", "db", "web", "db", "web"]));
    }

    #[test]
    fn host_with_pending_probe_is_skipped() {
        let mut scheduler = scheduler(&["web", "db"]);

        let web = scheduler.tick().unwrap(); // t=0
        assert_eq!(web.host, "web");
        let db = scheduler.tick().unwrap(); // t=1000
        assert_eq!(db.host, "db");
        complete(&mut scheduler, &db);

        // t=2000: web ainda pendente, db é disparado de novo
        let next = scheduler.tick().unwrap();
        assert_eq!(next.host, "db");
        assert_eq!(scheduler.in_flight_count(), 2);

        // ambos pendentes: nenhum disparo
        assert!(scheduler.tick().is_none());

        complete(&mut scheduler, &web);
        assert_eq!(scheduler.tick().unwrap().host, "web");
    }

    #[test]
    fn never_two_outstanding_probes_for_one_host() {
        let mut scheduler = scheduler(&["solo"]);
        let first = scheduler.tick().unwrap();
        for _ in 0..10 {
            assert!(scheduler.tick().is_none());
        }
        assert_eq!(scheduler.in_flight_count(), 1);
        complete(&mut scheduler, &first);
        assert!(scheduler.tick().is_some());
    }

    #[test]
    fn prioritize_dispatches_next_without_changing_order() {
        let mut scheduler = scheduler(&["a", "b", "c", "d"]);
        let a = scheduler.tick().unwrap();
        complete(&mut scheduler, &a);
        let cursor = scheduler.cursor();

        scheduler.prioritize("d").unwrap();
        let d = scheduler.tick().unwrap();
        assert_eq!(d.host, "d");
        assert!(d.prioritized);
        complete(&mut scheduler, &d);

        assert_eq!(scheduler.queue(), ids(&["a", "b", "c", "d"]).as_slice());
        assert_eq!(scheduler.cursor(), cursor);
        assert!(scheduler.pending_priority().is_none());
        assert_eq!(scheduler.tick().unwrap().host, "b");
    }

    #[test]
    fn prioritize_unknown_host_fails() {
        let mut scheduler = scheduler(&["a"]);
        assert!(matches!(
            scheduler.prioritize("z"),
            Err(MonitorError::UnknownHost(_))
        ));
    }

    #[test]
    fn pending_priority_waits_for_outstanding_probe() {
        let mut scheduler = scheduler(&["a", "b", "c"]);
        let a = scheduler.tick().unwrap();
        scheduler.prioritize("a").unwrap();

        // "a" pendente: segue o round-robin e mantém a prioridade
        assert_eq!(scheduler.tick().unwrap().host, "b");
        assert_eq!(scheduler.pending_priority(), Some("a"));

        complete(&mut scheduler, &a);
        let again = scheduler.tick().unwrap();
        assert_eq!(again.host, "a");
        assert!(again.prioritized);
    }

    #[test]
    fn membership_change_preserves_order_and_appends() {
        let mut scheduler = scheduler(&["a", "b", "c"]);
        let a = scheduler.tick().unwrap();
        complete(&mut scheduler, &a);
        // cursor aponta para "b"

        scheduler.membership_changed(&ids(&["d", "c", "b"]));
        assert_eq!(scheduler.queue(), ids(&["b", "c", "d"]).as_slice());
        assert_eq!(scheduler.tick().unwrap().host, "b");
    }

    #[test]
    fn removing_the_next_host_moves_cursor_to_its_successor() {
        let mut scheduler = scheduler(&["a", "b", "c"]);
        let a = scheduler.tick().unwrap();
        complete(&mut scheduler, &a);

        scheduler.membership_changed(&ids(&["a", "c"]));
        assert_eq!(scheduler.tick().unwrap().host, "c");
    }

    #[test]
    fn removal_invalidates_pending_probe() {
        let mut scheduler = scheduler(&["a", "b"]);
        let a = scheduler.tick().unwrap();
        scheduler.membership_changed(&ids(&["b"]));
        assert!(!scheduler.on_probe_result("a", a.ticket));
        assert_eq!(scheduler.in_flight_count(), 0);
    }

    #[test]
    fn idle_and_running_transitions() {
        let mut scheduler = scheduler(&["a"]);
        assert_eq!(
            scheduler.membership_changed(&[]),
            Some(SchedulerState::Idle)
        );
        assert!(scheduler.tick().is_none());
        assert_eq!(
            scheduler.membership_changed(&ids(&["x"])),
            Some(SchedulerState::Running)
        );
        assert_eq!(scheduler.membership_changed(&ids(&["x", "y"])), None);
    }

    #[test]
    fn rename_stales_old_ticket_and_keeps_position() {
        let mut scheduler = scheduler(&["a", "b"]);
        let a = scheduler.tick().unwrap();
        scheduler.rename("a", "alpha");

        assert_eq!(scheduler.queue(), ids(&["alpha", "b"]).as_slice());
        assert!(!scheduler.on_probe_result("a", a.ticket));
        assert!(!scheduler.on_probe_result("alpha", a.ticket));
        assert!(!scheduler.is_in_flight("alpha"));
    }

    #[test]
    fn reorder_keeps_next_host() {
        let mut scheduler = scheduler(&["a", "b", "c"]);
        let a = scheduler.tick().unwrap();
        complete(&mut scheduler, &a);

        scheduler.reorder(&ids(&["c", "a"])).unwrap();
        assert_eq!(scheduler.queue(), ids(&["c", "a", "b"]).as_slice());
        assert_eq!(scheduler.tick().unwrap().host, "b");
        assert!(scheduler.reorder(&ids(&["zz"])).is_err());
    }

    #[test]
    fn interval_is_validated() {
        let mut scheduler = scheduler(&["a"]);
        assert!(matches!(
            scheduler.set_interval(10),
            Err(MonitorError::InvalidInterval(10))
        ));
        assert!(scheduler.set_interval(250).unwrap());
        assert_eq!(scheduler.interval_ms(), 250);
    }
}
