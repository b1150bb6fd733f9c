//! history.rs — Histórico rotativo por host com retenção por idade
//!
//! Cada host mantém seus resultados em ordem de inserção (timestamps não
//! decrescentes). A cada inserção, entradas mais antigas que a janela de
//! retenção são descartadas. Não há limite por quantidade, só por idade.
//! Os contadores de sessão nunca sofrem poda.

use crate::error::MonitorError;
use crate::types::ProbeResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Histórico de um único host.
#[derive(Debug, Clone, Default)]
pub struct HostHistory {
    records: VecDeque<ProbeResult>,
    consecutive_failures: u32,
    session_success: u64,
    session_failure: u64,
}

impl HostHistory {
    pub fn records(&self) -> &VecDeque<ProbeResult> {
        &self.records
    }

    pub fn last(&self) -> Option<&ProbeResult> {
        self.records.back()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn session_success(&self) -> u64 {
        self.session_success
    }

    pub fn session_failure(&self) -> u64 {
        self.session_failure
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        while self
            .records
            .front()
            .is_some_and(|record| record.timestamp < cutoff)
        {
            self.records.pop_front();
        }
        before - self.records.len()
    }

    /// Tamanho do maior sufixo de falhas.
    fn trailing_failures(&self) -> u32 {
        self.records
            .iter()
            .rev()
            .take_while(|record| !record.success)
            .count() as u32
    }
}

/// Contagens de falhas consecutivas antes e depois de um `record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub previous_failures: u32,
    pub consecutive_failures: u32,
    pub pruned: usize,
}

/// Histórico de todos os hosts, indexado pela identidade.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    hosts: HashMap<String, HostHistory>,
    retention: Duration,
}

impl HistoryStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            hosts: HashMap::new(),
            retention,
        }
    }

    /// Garante um histórico vazio para o host (sem efeito se já existir).
    pub fn insert_host(&mut self, host: &str) {
        self.hosts.entry(host.to_string()).or_default();
    }

    /// Registra um resultado, podando tudo que ficou fora da janela.
    ///
    /// O timestamp do resultado é usado como "agora". Um resultado com
    /// timestamp anterior ao último registro é alinhado a ele para manter a
    /// ordem não decrescente.
    pub fn record(
        &mut self,
        host: &str,
        result: ProbeResult,
    ) -> Result<RecordOutcome, MonitorError> {
        let history = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| MonitorError::UnknownHost(host.to_string()))?;

        let mut result = result;
        if let Some(last) = history.records.back() {
            if result.timestamp < last.timestamp {
                debug!(
                    "[HOST {}] Timestamp {} anterior ao último registro {}, alinhando.",
                    host, result.timestamp, last.timestamp
                );
                result.timestamp = last.timestamp;
            }
        }

        let previous_failures = history.consecutive_failures;
        history.records.push_back(result);
        if result.success {
            history.session_success += 1;
        } else {
            history.session_failure += 1;
        }

        let pruned = history.prune(result.timestamp - self.retention);
        history.consecutive_failures = history.trailing_failures();

        Ok(RecordOutcome {
            previous_failures,
            consecutive_failures: history.consecutive_failures,
            pruned,
        })
    }

    /// Substitui o histórico de um host por registros carregados do disco.
    /// Os contadores de sessão começam zerados.
    pub fn restore(
        &mut self,
        host: &str,
        records: impl IntoIterator<Item = ProbeResult>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut loaded: Vec<ProbeResult> = records.into_iter().collect();
        loaded.sort_by_key(|record| record.timestamp);

        let mut history = HostHistory {
            records: loaded.into(),
            ..HostHistory::default()
        };
        history.prune(now - self.retention);
        history.consecutive_failures = history.trailing_failures();
        let kept = history.records.len();
        self.hosts.insert(host.to_string(), history);
        kept
    }

    pub fn get(&self, host: &str) -> Option<&HostHistory> {
        self.hosts.get(host)
    }

    pub fn remove(&mut self, host: &str) -> Option<HostHistory> {
        self.hosts.remove(host)
    }

    /// Move todo o estado de `old` para `new`.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), MonitorError> {
        let history = self
            .hosts
            .remove(old)
            .ok_or_else(|| MonitorError::UnknownHost(old.to_string()))?;
        self.hosts.insert(new.to_string(), history);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store() -> HistoryStore {
        let mut store = HistoryStore::new(Duration::hours(48));
        store.insert_host("web");
        store
    }

    #[test]
    fn unknown_host_is_an_error_not_a_panic() {
        let mut store = store();
        let err = store
            .record("nope", ProbeResult::new(at(0), true))
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownHost(h) if h == "nope"));
    }

    #[test]
    fn consecutive_failures_track_the_failure_suffix() {
        let mut store = store();
        let pattern = [true, false, false, true, false, false, false];
        for (i, ok) in pattern.iter().enumerate() {
            let outcome = store
                .record("web", ProbeResult::new(at(i as i64), *ok))
                .unwrap();
            let expected = store
                .get("web")
                .unwrap()
                .records()
                .iter()
                .rev()
                .take_while(|r| !r.success)
                .count() as u32;
            assert_eq!(outcome.consecutive_failures, expected);
        }
        let history = store.get("web").unwrap();
        assert_eq!(history.consecutive_failures(), 3);
        assert_eq!(history.session_success(), 2);
        assert_eq!(history.session_failure(), 5);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut store = store();
        store.record("web", ProbeResult::new(at(0), false)).unwrap();
        store.record("web", ProbeResult::new(at(1), false)).unwrap();
        let outcome = store.record("web", ProbeResult::new(at(2), true)).unwrap();
        assert_eq!(outcome.previous_failures, 2);
        assert_eq!(outcome.consecutive_failures, 0);
    }

    #[test]
    fn pruning_removes_exactly_the_stale_entries() {
        let mut store = store();
        let hour = 3600;
        // 50h, 49h e 47h antes do "agora" (t = 0)
        store
            .record("web", ProbeResult::new(at(-50 * hour), true))
            .unwrap();
        store
            .record("web", ProbeResult::new(at(-49 * hour), false))
            .unwrap();
        store
            .record("web", ProbeResult::new(at(-47 * hour), true))
            .unwrap();

        let outcome = store.record("web", ProbeResult::new(at(0), false)).unwrap();
        assert_eq!(outcome.pruned, 2);

        let history = store.get("web").unwrap();
        let kept: Vec<_> = history.records().iter().map(|r| r.timestamp).collect();
        assert_eq!(kept, vec![at(-47 * hour), at(0)]);
        // contadores de sessão não sofrem poda
        assert_eq!(history.session_success(), 2);
        assert_eq!(history.session_failure(), 2);
    }

    #[test]
    fn entry_exactly_at_the_cutoff_is_kept() {
        let mut store = store();
        store
            .record("web", ProbeResult::new(at(-48 * 3600), true))
            .unwrap();
        let outcome = store.record("web", ProbeResult::new(at(0), true)).unwrap();
        assert_eq!(outcome.pruned, 0);
        assert_eq!(store.get("web").unwrap().records().len(), 2);
    }

    #[test]
    fn out_of_order_timestamp_is_aligned_to_last_record() {
        let mut store = store();
        store.record("web", ProbeResult::new(at(10), true)).unwrap();
        store.record("web", ProbeResult::new(at(5), false)).unwrap();
        let records = store.get("web").unwrap().records();
        assert_eq!(records[1].timestamp, at(10));
        assert!(!records[1].success);
    }

    #[test]
    fn restore_sorts_prunes_and_recomputes_suffix() {
        let mut store = HistoryStore::new(Duration::hours(48));
        let records = vec![
            ProbeResult::new(at(20), false),
            ProbeResult::new(at(-100 * 3600), true),
            ProbeResult::new(at(10), true),
            ProbeResult::new(at(30), false),
        ];
        let kept = store.restore("db", records, at(40));
        assert_eq!(kept, 3);

        let history = store.get("db").unwrap();
        assert_eq!(history.consecutive_failures(), 2);
        assert_eq!(history.session_success(), 0);
        assert_eq!(history.session_failure(), 0);
        assert_eq!(history.records().front().unwrap().timestamp, at(10));
    }

    #[test]
    fn rename_moves_all_state() {
        let mut store = store();
        store.record("web", ProbeResult::new(at(0), false)).unwrap();
        store.rename("web", "www").unwrap();

        assert!(store.get("web").is_none());
        let history = store.get("www").unwrap();
        assert_eq!(history.records().len(), 1);
        assert_eq!(history.consecutive_failures(), 1);
        assert_eq!(history.session_failure(), 1);

        assert!(matches!(
            store.rename("web", "x"),
            Err(MonitorError::UnknownHost(_))
        ));
    }

    #[test]
    fn remove_drops_host_state() {
        let mut store = store();
        store.record("web", ProbeResult::new(at(0), true)).unwrap();
        assert!(store.remove("web").is_some());
        assert!(store.get("web").is_none());
        assert!(store.record("web", ProbeResult::new(at(1), true)).is_err());
    }
}
