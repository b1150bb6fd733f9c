//! error.rs — Taxonomia de erros do núcleo de monitoramento
//!
//! Nenhuma condição aqui é fatal: o controlador reporta ao chamador e segue.
//! Falhas de probe não são erros (viram `success = false`).

use std::path::PathBuf;
use thiserror::Error;

/// Erros reportados pelas operações de registro, scheduler e histórico.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Operação referenciou um host que não está cadastrado.
    #[error("host desconhecido: {0}")]
    UnknownHost(String),
    /// Tentativa de cadastrar (ou renomear para) um host que já existe.
    #[error("host já cadastrado: {0}")]
    AlreadyExists(String),
    #[error("identificador de host vazio")]
    EmptyIdentity,
    #[error("porta TCP inválida: {0} (esperado 1-65535)")]
    InvalidPort(u16),
    #[error("intervalo inválido: {0}ms (esperado 100-5000ms)")]
    InvalidInterval(u64),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// O controlador já foi encerrado e não aceita mais comandos.
    #[error("monitor encerrado")]
    Stopped,
}

/// Falhas de leitura/escrita do arquivo de histórico.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("conteúdo inválido em {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("versão de arquivo não suportada: {0}")]
    UnsupportedVersion(u32),
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Arquivo ausente é o caso normal da primeira execução.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
