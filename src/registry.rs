//! registry.rs — Conjunto autoritativo de hosts monitorados
//!
//! Mantém a ordem persistida dos hosts; a fila do scheduler é derivada dela.

use crate::error::MonitorError;
use crate::types::{CheckConfig, DEFAULT_CATEGORY, Host};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Vec<Host>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cadastra um host. Identidades são normalizadas com `trim`.
    ///
    /// Retorna a identidade normalizada. Duplicatas não alteram o registro e
    /// retornam `AlreadyExists`.
    pub fn add(
        &mut self,
        identity: &str,
        category: Option<&str>,
        check: CheckConfig,
    ) -> Result<String, MonitorError> {
        let identity = normalize(identity)?;
        check.validate()?;
        if self.contains(&identity) {
            return Err(MonitorError::AlreadyExists(identity));
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);
        self.hosts.push(
            Host::new(identity.clone())
                .with_category(category)
                .with_check(check),
        );
        Ok(identity)
    }

    pub fn remove(&mut self, identity: &str) -> Result<Host, MonitorError> {
        let index = self.index_of(identity)?;
        Ok(self.hosts.remove(index))
    }

    /// Renomeia mantendo categoria, verificação e posição.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<String, MonitorError> {
        let index = self.index_of(old)?;
        let new = normalize(new)?;
        if new == old {
            return Ok(new);
        }
        if self.contains(&new) {
            return Err(MonitorError::AlreadyExists(new));
        }
        self.hosts[index].identity = new.clone();
        Ok(new)
    }

    pub fn set_category(&mut self, identity: &str, category: &str) -> Result<(), MonitorError> {
        let index = self.index_of(identity)?;
        let category = category.trim();
        self.hosts[index].category = if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category.to_string()
        };
        Ok(())
    }

    pub fn set_check_config(
        &mut self,
        identity: &str,
        check: CheckConfig,
    ) -> Result<(), MonitorError> {
        check.validate()?;
        let index = self.index_of(identity)?;
        self.hosts[index].check = check;
        Ok(())
    }

    /// Reordena os hosts: os listados primeiro, na ordem dada; os demais
    /// seguem na ordem atual.
    pub fn reorder(&mut self, order: &[String]) -> Result<(), MonitorError> {
        if let Some(unknown) = order.iter().find(|id| !self.contains(id)) {
            return Err(MonitorError::UnknownHost(unknown.clone()));
        }
        let mut remaining = std::mem::take(&mut self.hosts);
        for identity in order {
            if let Some(pos) = remaining.iter().position(|h| &h.identity == identity) {
                self.hosts.push(remaining.remove(pos));
            }
        }
        self.hosts.extend(remaining);
        Ok(())
    }

    pub fn get(&self, identity: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.identity == identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.get(identity).is_some()
    }

    pub fn list(&self) -> &[Host] {
        &self.hosts
    }

    /// Identidades na ordem persistida.
    pub fn identities(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.identity.clone()).collect()
    }

    /// Categorias existentes, ordenadas e sem repetição.
    pub fn categories(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|h| h.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn index_of(&self, identity: &str) -> Result<usize, MonitorError> {
        self.hosts
            .iter()
            .position(|h| h.identity == identity)
            .ok_or_else(|| MonitorError::UnknownHost(identity.to_string()))
    }
}

fn normalize(identity: &str) -> Result<String, MonitorError> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(MonitorError::EmptyIdentity);
    }
    Ok(identity.to_string())
}

/// Lê uma lista de hosts em texto: um por linha, ignorando linhas vazias e
/// comentários iniciados por `#`.
pub fn parse_host_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HostRegistry {
        let mut registry = HostRegistry::new();
        registry
            .add("web", Some("Servers"), CheckConfig::Tcp { port: 443 })
            .unwrap();
        registry.add("db", None, CheckConfig::Icmp).unwrap();
        registry
    }

    #[test]
    fn add_uses_defaults_and_keeps_order() {
        let registry = registry();
        assert_eq!(registry.identities(), vec!["web", "db"]);
        assert_eq!(registry.get("db").unwrap().category, DEFAULT_CATEGORY);
        assert_eq!(
            registry.get("web").unwrap().check,
            CheckConfig::Tcp { port: 443 }
        );
    }

    #[test]
    fn duplicate_add_is_reported_and_ignored() {
        let mut registry = registry();
        let err = registry
            .add(" web ", Some("Other"), CheckConfig::Icmp)
            .unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyExists(h) if h == "web"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("web").unwrap().category, "Servers");
    }

    #[test]
    fn blank_identity_is_rejected() {
        let mut registry = registry();
        assert!(matches!(
            registry.add("   ", None, CheckConfig::Icmp),
            Err(MonitorError::EmptyIdentity)
        ));
    }

    #[test]
    fn unknown_hosts_fail() {
        let mut registry = registry();
        assert!(matches!(
            registry.remove("x"),
            Err(MonitorError::UnknownHost(_))
        ));
        assert!(matches!(
            registry.rename("x", "y"),
            Err(MonitorError::UnknownHost(_))
        ));
        assert!(matches!(
            registry.set_category("x", "c"),
            Err(MonitorError::UnknownHost(_))
        ));
    }

    #[test]
    fn rename_preserves_configuration_and_position() {
        let mut registry = registry();
        registry.rename("web", "www").unwrap();
        assert_eq!(registry.identities(), vec!["www", "db"]);
        let host = registry.get("www").unwrap();
        assert_eq!(host.category, "Servers");
        assert_eq!(host.check, CheckConfig::Tcp { port: 443 });

        assert!(matches!(
            registry.rename("www", "db"),
            Err(MonitorError::AlreadyExists(_))
        ));
        assert_eq!(registry.rename("db", "db").unwrap(), "db");
    }

    #[test]
    fn set_check_config_validates_port() {
        let mut registry = registry();
        assert!(matches!(
            registry.set_check_config("db", CheckConfig::Tcp { port: 0 }),
            Err(MonitorError::InvalidPort(0))
        ));
        registry
            .set_check_config("db", CheckConfig::Tcp { port: 5432 })
            .unwrap();
        assert_eq!(registry.get("db").unwrap().check.port(), Some(5432));
    }

    #[test]
    fn reorder_puts_listed_hosts_first() {
        let mut registry = registry();
        registry.add("cache", None, CheckConfig::Icmp).unwrap();
        registry.reorder(&["cache".to_string()]).unwrap();
        assert_eq!(registry.identities(), vec!["cache", "web", "db"]);

        assert!(registry.reorder(&["ghost".to_string()]).is_err());
        assert_eq!(registry.identities(), vec!["cache", "web", "db"]);
    }

    #[test]
    fn categories_are_sorted_and_unique() {
        let mut registry = registry();
        registry.add("dns", Some("Servers"), CheckConfig::Icmp).unwrap();
        registry.set_category("db", "  ").unwrap();
        assert_eq!(registry.categories(), vec!["Default", "Servers"]);
    }

    #[test]
    fn host_list_skips_blanks_and_comments() {
        let text = "web\n\n  # servidores internos\n db \n10.0.0.1\n";
        assert_eq!(parse_host_list(text), vec!["web", "db", "10.0.0.1"]);
    }
}
