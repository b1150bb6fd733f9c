//! health.rs — Nível de saúde por host e global, e alerta de host inacessível
//!
//! - `Down`: os dois últimos resultados são falhas.
//! - `Degraded`: último resultado é falha, mas não dois seguidos.
//! - `Healthy`: último resultado é sucesso, ou ainda não há resultados.
//!
//! O alerta de inacessível é por borda: dispara uma vez quando o host atinge
//! exatamente duas falhas consecutivas.

use crate::history::{HostHistory, RecordOutcome};
use crate::types::{HealthTier, MonitorEvent, ProbeResult, TierScope};
use std::collections::{HashMap, VecDeque};

/// Falhas consecutivas que caracterizam um host inacessível.
pub const UNREACHABLE_THRESHOLD: u32 = 2;

pub fn tier_from_records(records: &VecDeque<ProbeResult>) -> HealthTier {
    let mut recent = records.iter().rev();
    match (recent.next(), recent.next()) {
        (Some(last), Some(previous)) if !last.success && !previous.success => HealthTier::Down,
        (Some(last), _) if !last.success => HealthTier::Degraded,
        _ => HealthTier::Healthy,
    }
}

pub fn host_tier(history: Option<&HostHistory>) -> HealthTier {
    history.map_or(HealthTier::Healthy, |h| tier_from_records(h.records()))
}

/// True somente na transição para exatamente duas falhas seguidas.
pub fn crossed_unreachable(outcome: &RecordOutcome) -> bool {
    outcome.previous_failures < UNREACHABLE_THRESHOLD
        && outcome.consecutive_failures == UNREACHABLE_THRESHOLD
}

/// Último nível conhecido de cada host; emite eventos apenas em mudanças.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    tiers: HashMap<String, HealthTier>,
    global: HealthTier,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self {
            tiers: HashMap::new(),
            global: HealthTier::Healthy,
        }
    }

    pub fn status(&self, host: &str) -> HealthTier {
        self.tiers.get(host).copied().unwrap_or(HealthTier::Healthy)
    }

    pub fn global(&self) -> HealthTier {
        self.global
    }

    /// Atualiza o nível do host. Retorna as mudanças (host e/ou global).
    pub fn update(&mut self, host: &str, tier: HealthTier) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        let previous = self.tiers.insert(host.to_string(), tier);
        if previous.unwrap_or(HealthTier::Healthy) != tier {
            events.push(MonitorEvent::TierChanged {
                scope: TierScope::Host(host.to_string()),
                tier,
            });
        }
        events.extend(self.recompute_global());
        events
    }

    /// Esquece o host removido; pode alterar o nível global.
    pub fn forget(&mut self, host: &str) -> Vec<MonitorEvent> {
        self.tiers.remove(host);
        self.recompute_global().into_iter().collect()
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(tier) = self.tiers.remove(old) {
            self.tiers.insert(new.to_string(), tier);
        }
    }

    fn recompute_global(&mut self) -> Option<MonitorEvent> {
        let global = self
            .tiers
            .values()
            .copied()
            .max()
            .unwrap_or(HealthTier::Healthy);
        if global == self.global {
            return None;
        }
        self.global = global;
        Some(MonitorEvent::TierChanged {
            scope: TierScope::Global,
            tier: global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use chrono::{TimeZone, Utc};

    fn records(pattern: &[bool]) -> VecDeque<ProbeResult> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, ok)| ProbeResult::new(Utc.timestamp_opt(i as i64, 0).unwrap(), *ok))
            .collect()
    }

    #[test]
    fn tier_follows_last_two_results() {
        assert_eq!(tier_from_records(&records(&[])), HealthTier::Healthy);
        assert_eq!(tier_from_records(&records(&[false])), HealthTier::Degraded);
        assert_eq!(
            tier_from_records(&records(&[true, false])),
            HealthTier::Degraded
        );
        assert_eq!(
            tier_from_records(&records(&[true, false, false])),
            HealthTier::Down
        );
        assert_eq!(
            tier_from_records(&records(&[false, false, true])),
            HealthTier::Healthy
        );
    }

    #[test]
    fn four_failures_fire_exactly_one_alert() {
        let mut store = HistoryStore::new(chrono::Duration::hours(48));
        store.insert_host("web");
        let mut alerts = 0;
        for i in 0..4 {
            let outcome = store
                .record(
                    "web",
                    ProbeResult::new(Utc.timestamp_opt(i, 0).unwrap(), false),
                )
                .unwrap();
            if crossed_unreachable(&outcome) {
                alerts += 1;
                assert_eq!(outcome.consecutive_failures, 2);
            }
        }
        assert_eq!(alerts, 1);
    }

    #[test]
    fn alert_rearms_after_recovery() {
        let mut store = HistoryStore::new(chrono::Duration::hours(48));
        store.insert_host("web");
        let pattern = [false, false, true, false, false, false];
        let fired: Vec<bool> = pattern
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let result = ProbeResult::new(Utc.timestamp_opt(i as i64, 0).unwrap(), *ok);
                crossed_unreachable(&store.record("web", result).unwrap())
            })
            .collect();
        assert_eq!(fired, vec![false, true, false, false, true, false]);
    }

    #[test]
    fn global_is_worst_host_tier() {
        let mut health = HealthAggregator::new();
        assert_eq!(health.global(), HealthTier::Healthy);

        let events = health.update("a", HealthTier::Degraded);
        assert_eq!(
            events,
            vec![
                MonitorEvent::TierChanged {
                    scope: TierScope::Host("a".into()),
                    tier: HealthTier::Degraded
                },
                MonitorEvent::TierChanged {
                    scope: TierScope::Global,
                    tier: HealthTier::Degraded
                },
            ]
        );

        health.update("b", HealthTier::Down);
        assert_eq!(health.global(), HealthTier::Down);

        // sem mudança de nível: nenhum evento
        assert!(health.update("b", HealthTier::Down).is_empty());

        let events = health.forget("b");
        assert_eq!(
            events,
            vec![MonitorEvent::TierChanged {
                scope: TierScope::Global,
                tier: HealthTier::Degraded
            }]
        );
    }

    #[test]
    fn first_healthy_result_is_not_a_change() {
        let mut health = HealthAggregator::new();
        assert!(health.update("a", HealthTier::Healthy).is_empty());
        assert_eq!(health.status("a"), HealthTier::Healthy);
        assert_eq!(health.status("desconhecido"), HealthTier::Healthy);
    }

    #[test]
    fn rename_keeps_tier() {
        let mut health = HealthAggregator::new();
        health.update("a", HealthTier::Down);
        health.rename("a", "b");
        assert_eq!(health.status("b"), HealthTier::Down);
        assert_eq!(health.status("a"), HealthTier::Healthy);
        assert_eq!(health.global(), HealthTier::Down);
    }
}
