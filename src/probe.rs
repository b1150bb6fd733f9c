//! probe.rs — Verificação única de alcance (ICMP ou TCP) com timeout
//!
//! O contrato é um booleano de conectividade: qualquer erro de rede, de
//! resolução ou de permissão vira `false`, nunca um erro para o chamador.

use crate::config::IcmpBackend;
use crate::types::CheckConfig;
use async_trait::async_trait;
use std::net::IpAddr;
use surge_ping::{Client, Config as PingConfig, ICMP, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};
use trust_dns_resolver::TokioAsyncResolver;

const PING_PAYLOAD: [u8; 56] = [0; 56];

/// Uma verificação de alcance. Implementações devem respeitar o timeout.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, host: &str, check: &CheckConfig, timeout: Duration) -> bool;
}

/// Clientes ICMP via socket (um por família de endereço).
struct IcmpClients {
    v4: Option<Client>,
    v6: Option<Client>,
}

impl IcmpClients {
    /// Retorna None se nenhum socket ICMP pôde ser aberto (ex.: sem permissão).
    fn open() -> Option<Self> {
        let v4 = Client::new(&PingConfig::default())
            .map_err(|e| warn!("[PROBE] Socket ICMPv4 indisponível: {}", e))
            .ok();
        let v6 = Client::new(&PingConfig::builder().kind(ICMP::V6).build())
            .map_err(|e| debug!("[PROBE] Socket ICMPv6 indisponível: {}", e))
            .ok();
        if v4.is_none() && v6.is_none() {
            return None;
        }
        Some(Self { v4, v6 })
    }

    fn for_addr(&self, addr: &IpAddr) -> Option<&Client> {
        match addr {
            IpAddr::V4(_) => self.v4.as_ref(),
            IpAddr::V6(_) => self.v6.as_ref(),
        }
    }
}

enum IcmpMode {
    Socket(IcmpClients),
    Command,
}

/// Probe real de rede: ICMP (socket surge-ping ou comando `ping`) e TCP.
pub struct NetworkProbe {
    icmp: IcmpMode,
    resolver: Option<TokioAsyncResolver>,
}

impl NetworkProbe {
    /// Precisa ser criado dentro do runtime tokio (os clientes ICMP iniciam
    /// tasks de recepção).
    pub fn new(backend: IcmpBackend) -> Self {
        let icmp = match backend {
            IcmpBackend::Socket => match IcmpClients::open() {
                Some(clients) => IcmpMode::Socket(clients),
                None => {
                    warn!("[PROBE] Sem socket ICMP, usando o comando `ping` do sistema.");
                    IcmpMode::Command
                }
            },
            IcmpBackend::Command => IcmpMode::Command,
        };
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| warn!("[PROBE] Resolver DNS do sistema indisponível: {}", e))
            .ok();
        Self { icmp, resolver }
    }

    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Some(addr);
        }
        match &self.resolver {
            Some(resolver) => match resolver.lookup_ip(host).await {
                Ok(lookup) => lookup.iter().next(),
                Err(e) => {
                    debug!("[HOST {}] Falha na resolução DNS: {}", host, e);
                    None
                }
            },
            None => match tokio::net::lookup_host((host, 0)).await {
                Ok(mut addrs) => addrs.next().map(|a| a.ip()),
                Err(e) => {
                    debug!("[HOST {}] Falha na resolução: {}", host, e);
                    None
                }
            },
        }
    }

    async fn icmp_socket(&self, clients: &IcmpClients, host: &str, wait: Duration) -> bool {
        let Some(addr) = self.resolve(host).await else {
            return false;
        };
        let Some(client) = clients.for_addr(&addr) else {
            debug!("[HOST {}] Sem socket ICMP para {}", host, addr);
            return false;
        };
        let mut pinger = client.pinger(addr, PingIdentifier(rand::random())).await;
        pinger.timeout(wait);
        match pinger.ping(PingSequence(0), &PING_PAYLOAD).await {
            Ok((_reply, rtt)) => {
                debug!("[HOST {}] Resposta ICMP em {:?}", host, rtt);
                true
            }
            Err(e) => {
                debug!("[HOST {}] Falha ICMP: {}", host, e);
                false
            }
        }
    }

    async fn icmp_command(host: &str, wait: Duration) -> bool {
        let mut cmd = Command::new("ping");
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => {
                cmd.arg("-6");
            }
            Ok(IpAddr::V4(_)) => {
                cmd.arg("-4");
            }
            Err(_) => {}
        }
        let wait_secs = wait.as_secs().max(1);
        cmd.arg("-c")
            .arg("1")
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(host)
            .kill_on_drop(true);

        match timeout(wait, cmd.output()).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(e)) => {
                debug!("[HOST {}] Falha ao executar ping: {}", host, e);
                false
            }
            Err(_) => false,
        }
    }

    async fn tcp(host: &str, port: u16, wait: Duration) -> bool {
        match timeout(wait, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("[HOST {}] Conexão TCP na porta {} falhou: {}", host, port, e);
                false
            }
            Err(_) => {
                debug!("[HOST {}] Timeout na conexão TCP porta {}", host, port);
                false
            }
        }
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn probe(&self, host: &str, check: &CheckConfig, wait: Duration) -> bool {
        match *check {
            CheckConfig::Tcp { port } => Self::tcp(host, port, wait).await,
            CheckConfig::Icmp => match &self.icmp {
                IcmpMode::Socket(clients) => timeout(wait, self.icmp_socket(clients, host, wait))
                    .await
                    .unwrap_or(false),
                IcmpMode::Command => Self::icmp_command(host, wait).await,
            },
        }
    }
}
