mod stats;

use clap::Parser;
use log::{info, warn};
use stats::CollectorStats;
use std::net::SocketAddr;
use sw420_protocol::{TelemetryRecord, MAX_DATAGRAM_SIZE};
use tokio::net::UdpSocket;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address to receive telemetry on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Readings above this value count as high vibration
    #[arg(short, long, default_value_t = 5000)]
    alert_threshold: u16,

    /// Log statistics every this many readings
    #[arg(short, long, default_value_t = 20)]
    stats_every: u64,

    /// Print each reading as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    env_logger::init();

    let socket = UdpSocket::bind(args.bind).await?;
    info!("Listening for telemetry on {}", socket.local_addr()?);
    info!("Alert threshold: {}", args.alert_threshold);

    let mut stats = CollectorStats::new(args.alert_threshold);
    let mut buf = [0; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Exiting");
                break;
            }
            msg = socket.recv_from(&mut buf) => {
                match msg {
                    Ok((len, addr)) => handle_datagram(&args, &mut stats, &buf[..len], addr)?,
                    Err(e) => warn!("Receive error: {:?}", e),
                }
            }
        }
    }

    info!("{stats}");
    if args.json {
        println!("{}", serde_json::to_string(&stats)?);
    }

    Ok(())
}

fn handle_datagram(
    args: &Cli,
    stats: &mut CollectorStats,
    data: &[u8],
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let record = match parse_datagram(data) {
        Ok(record) => record,
        Err(e) => {
            warn!(
                "Invalid message from {}: {} (raw: {:?})",
                addr,
                e,
                String::from_utf8_lossy(data)
            );
            return Ok(());
        }
    };

    let recorded = stats.record(&record);

    if recorded.new_sensor {
        info!("Sensor connected: {} from {}", record.sensor_id, addr);
    }

    let status = if recorded.alert { "ALERT" } else { "normal" };
    info!(
        "[{}] {:20} | value: {:>6} {:>7} | {}",
        record.timestamp.format(sw420_protocol::TIMESTAMP_FORMAT),
        record.sensor_id,
        record.value,
        record.unit,
        status
    );

    if args.json {
        println!("{}", serde_json::to_string(&record)?);
    }

    if args.stats_every > 0 && stats.total_readings() % args.stats_every == 0 {
        info!("{stats}");
    }

    Ok(())
}

fn parse_datagram(data: &[u8]) -> anyhow::Result<TelemetryRecord> {
    let s = std::str::from_utf8(data)?;
    Ok(s.parse()?)
}
