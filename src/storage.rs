//! storage.rs — Persistência dos hosts e do histórico em arquivo JSON
//!
//! Um registro por host (identidade, categoria, verificação e histórico como
//! lista de pares `[timestamp ISO-8601, sucesso]`), na ordem do registro.
//! A gravação é atômica (arquivo temporário + rename) e feita por uma task
//! própria alimentada por um canal `watch`: só a versão mais recente importa.

use crate::error::PersistenceError;
use crate::types::{CheckConfig, DEFAULT_CATEGORY, Host, ProbeResult};
use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Versão do formato do arquivo.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Conteúdo do arquivo, como lido do disco.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub notifications_enabled: Option<bool>,
    #[serde(default)]
    pub hosts: Vec<HostRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostRecord {
    pub identity: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub records: Vec<(DateTime<Utc>, bool)>,
}

impl HostRecord {
    pub fn host(&self) -> Host {
        Host::new(self.identity.clone())
            .with_category(self.category.clone())
            .with_check(self.check)
    }

    pub fn results(&self) -> impl Iterator<Item = ProbeResult> + '_ {
        self.records
            .iter()
            .map(|(timestamp, success)| ProbeResult::new(*timestamp, *success))
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Visão emprestada do estado para serialização sem copiar o histórico.
#[derive(Debug, Serialize)]
pub struct SnapshotView<'a> {
    pub version: u32,
    pub interval_ms: u64,
    pub notifications_enabled: bool,
    pub hosts: Vec<HostRecordView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct HostRecordView<'a> {
    pub identity: &'a str,
    pub category: &'a str,
    pub check: CheckConfig,
    #[serde(serialize_with = "serialize_records")]
    pub records: Option<&'a VecDeque<ProbeResult>>,
}

fn serialize_records<S>(
    records: &Option<&VecDeque<ProbeResult>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(records.map_or(0, |r| r.len())))?;
    for record in records.iter().flat_map(|r| r.iter()) {
        seq.serialize_element(&(record.timestamp, record.success))?;
    }
    seq.end()
}

impl SnapshotView<'_> {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Arquivo de histórico.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Snapshot, PersistenceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::json(&self.path, e))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Grava de forma atômica: escreve em `<arquivo>.tmp` e renomeia.
    pub async fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::io(parent, e))?;
        }
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Inicia a task gravadora. Cada valor enviado substitui o anterior.
    pub fn spawn_writer(self) -> PersistenceWriter {
        let (tx, mut rx) = watch::channel::<Option<Arc<Vec<u8>>>>(None);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let bytes = rx.borrow_and_update().clone();
                let Some(bytes) = bytes else { continue };
                match self.save(&bytes).await {
                    Ok(()) => debug!(
                        "[STORAGE] Histórico gravado em {} ({} bytes).",
                        self.path.display(),
                        bytes.len()
                    ),
                    Err(e) => warn!("[STORAGE] Erro ao gravar histórico: {}", e),
                }
            }
        });
        PersistenceWriter { tx, handle }
    }
}

/// Ponta de envio da task gravadora.
pub struct PersistenceWriter {
    tx: watch::Sender<Option<Arc<Vec<u8>>>>,
    handle: JoinHandle<()>,
}

impl PersistenceWriter {
    pub fn submit(&self, bytes: Vec<u8>) {
        // sem receptor a task já terminou; não há o que fazer
        let _ = self.tx.send(Some(Arc::new(bytes)));
    }

    /// Fecha o canal e espera a última gravação pendente.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!("[STORAGE] Task de gravação terminou com erro: {:?}", e);
        }
    }
}
