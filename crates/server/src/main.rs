mod config;
mod events;
mod handler;
mod server;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use realm::MapId;
use server::GameServer;

#[derive(Parser)]
#[command(name = "realm-server")]
#[command(about = "Authoritative 2D RPG world server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = realm::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = realm::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 64)]
    max_clients: usize,

    #[arg(long, default_value_t = 30, help = "Seconds of silence before a client is dropped")]
    timeout_secs: u64,

    #[arg(long, default_value_t = 200, help = "Resend interval for unacked reliable frames in ms")]
    resend_ms: u64,

    #[arg(long, default_value_t = 1, help = "Map new characters start on")]
    start_map: u16,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        timeout: Duration::from_secs(args.timeout_secs),
        resend_interval: Duration::from_millis(args.resend_ms),
        start_map: MapId(args.start_map),
    };

    let mut server = GameServer::new(&bind_addr, config)?;
    log::info!(
        "Server started on {} with {} maps",
        server.local_addr(),
        server.world().maps().count()
    );

    server.run();

    let stats = server.stats();
    log::info!(
        "Server shutting down after {} ticks ({} frames sent, {} received)",
        stats.tick,
        stats.network_stats.frames_sent,
        stats.network_stats.frames_received
    );
    Ok(())
}
