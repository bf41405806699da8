//! NetworkSink - streams snapshots to a UDP collector

use contracts::{CloudSink, ContractError, LinkStatus, TelemetrySnapshot};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How long a reachability check waits for a refusal
const REACH_WAIT: Duration = Duration::from_millis(100);

/// Wire encoding of a published snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// Same JSON body clients receive, without the `type` tag
    #[default]
    Json,
    /// Compact binary
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Collector address
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Datagrams above this size are refused
    pub max_packet_size: usize,
    /// Spacing of reachability checks while the collector is down
    pub retry_interval: Duration,
}

impl NetworkSinkConfig {
    /// Parse `addr`, `format`, `max_packet_size` and `retry_ms` from sink params
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", raw, e))?,
            None => 65000,
        };

        let retry_ms: u64 = match params.get("retry_ms") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid retry_ms '{}': {}", raw, e))?,
            None => 1000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
            retry_interval: Duration::from_millis(retry_ms.max(1)),
        })
    }
}

/// UDP publisher
///
/// The connected flag goes down when a send fails. While it is down the
/// dispatcher stops forwarding, so the sink checks the collector itself
/// every `retry_interval` and raises the flag once a check is not refused.
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
    status: LinkStatus,
    recovery: Option<JoinHandle<()>>,
    /// Socket may hold a refusal from the outage
    stale_socket: bool,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = open_socket(config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
            status: LinkStatus::new(true),
            recovery: None,
            stale_socket: false,
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_write(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn encode(&self, snapshot: &TelemetrySnapshot) -> Result<Vec<u8>, ContractError> {
        let data = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(snapshot)?,
            NetworkFormat::Bincode => bincode::serialize(snapshot)
                .map_err(|e| ContractError::sink_write(&self.name, format!("bincode error: {}", e)))?,
        };

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "payload of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }

    /// Spawn the recovery loop unless one is already running
    fn start_recovery(&mut self) {
        if self.recovery.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let name = self.name.clone();
        let addr = self.config.addr;
        let interval = self.config.retry_interval;
        let status = self.status.clone();
        self.recovery = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if collector_reachable(addr).await {
                    status.set(true);
                    info!(sink = %name, target = %addr, "Collector reachable again");
                    return;
                }
                debug!(sink = %name, target = %addr, "Collector still unreachable");
            }
        }));
    }

    fn stop_recovery(&mut self) {
        if let Some(task) = self.recovery.take() {
            task.abort();
        }
    }
}

impl Drop for NetworkSink {
    fn drop(&mut self) {
        self.stop_recovery();
    }
}

/// Send an empty datagram from a throwaway socket and wait briefly for an
/// ICMP refusal. Silence counts as reachable; collectors ignore empty
/// datagrams.
async fn collector_reachable(addr: SocketAddr) -> bool {
    let Ok(socket) = open_socket(addr).await else {
        return false;
    };
    if socket.send(&[]).await.is_err() {
        return false;
    }
    let mut buf = [0u8; 1];
    match tokio::time::timeout(REACH_WAIT, socket.recv(&mut buf)).await {
        Ok(Ok(_)) | Err(_) => true,
        Ok(Err(_)) => false,
    }
}

/// Ephemeral local socket connected to `addr`
async fn open_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

impl CloudSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> LinkStatus {
        self.status.clone()
    }

    #[instrument(
        name = "network_sink_publish",
        skip(self, snapshot),
        fields(sink = %self.name, sequence = snapshot.sequence)
    )]
    async fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), ContractError> {
        let data = self.encode(snapshot)?;
        if self.stale_socket && self.socket.is_some() && self.status.is_connected() {
            let fresh = open_socket(self.config.addr)
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
            self.socket = Some(fresh);
            self.stale_socket = false;
        }
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;

        match socket.send(&data).await {
            Ok(sent) => {
                self.status.set(true);
                debug!(sink = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                if self.status.is_connected() {
                    warn!(sink = %self.name, error = %e, "Collector unreachable");
                }
                self.status.set(false);
                self.stale_socket = true;
                self.start_recovery();
                Err(ContractError::sink_write(&self.name, e.to_string()))
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.stop_recovery();
        self.socket = None;
        self.status.set(false);
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
