use crate::sensor::RawValue;
use anyhow::Context;
use chrono::{Local, SubsecRound};
use log::debug;
use serde::Deserialize;
use std::net::SocketAddr;
use sw420_protocol::TelemetryRecord;
use tokio::net::UdpSocket;

#[derive(Debug, Deserialize)]
pub(crate) struct TelemetryConfig {
    host: String,
    port: u16,
}

/// Forwards readings as single datagrams to a collector.
pub(crate) struct TelemetryForwarder {
    socket: UdpSocket,
    target: SocketAddr,
}

impl TelemetryForwarder {
    pub(crate) async fn new(config: TelemetryConfig) -> anyhow::Result<Self> {
        let target = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await?
            .next()
            .with_context(|| format!("no address found for {}", config.host))?;

        let bind: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        let socket = UdpSocket::bind(bind).await?;

        Ok(Self { socket, target })
    }

    pub(crate) fn target(&self) -> SocketAddr {
        self.target
    }

    pub(crate) async fn send(&self, sensor_id: &str, unit: &str, raw: RawValue) -> anyhow::Result<()> {
        let timestamp = Local::now().naive_local().trunc_subsecs(0);
        let record = TelemetryRecord::new(sensor_id, timestamp, raw.wire_value(), unit)?;
        let s = record.to_string();

        debug!("Sending telemetry to {}: {}", self.target, s);
        self.socket.send_to(s.as_bytes(), self.target).await?;

        Ok(())
    }
}
