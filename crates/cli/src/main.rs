use anyhow::Context;
use clap::Parser;
use ecs_forwarder_domain::CliOverrides;
use ecs_forwarder_infrastructure::dns::ForwardingServer;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod di;

#[derive(Parser)]
#[command(name = "ecs-forwarder")]
#[command(version)]
#[command(about = "Local DNS forwarder that adds EDNS Client Subnet and relays queries over DoH or DoT")]
#[command(
    after_help = "DoT sessions are opened by the forwarder itself, so --socks5 applies to DoT as well as DoH.\n\
                  Without --ecs the public IPv4 address is looked up once at startup and its /24 is used."
)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Local IP address to listen on
    #[arg(short = 'i', long = "ip", value_name = "ADDR")]
    ip: Option<String>,

    /// DNS port for the UDP and TCP listeners
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// DNS-over-HTTPS endpoint (https:// only)
    #[arg(long, value_name = "URL", conflicts_with = "dot")]
    doh: Option<String>,

    /// DNS-over-TLS server, port defaults to 853
    #[arg(long, value_name = "HOST[:PORT]")]
    dot: Option<String>,

    /// SOCKS5 proxy for upstream connections
    #[arg(long, value_name = "HOST:PORT")]
    socks5: Option<String>,

    /// Client subnet to announce, as IPv4 or IPv4 CIDR
    #[arg(long, value_name = "IP[/PREFIX]")]
    ecs: Option<String>,

    /// Plain-text service used to discover the public IPv4 address
    #[arg(long, value_name = "URL")]
    ip_service: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print local IPv4 addresses and exit
    #[arg(long)]
    list_ips: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            bind_address: self.ip.clone(),
            dns_port: self.port,
            doh_url: self.doh.clone(),
            dot_address: self.dot.clone(),
            socks5_proxy: self.socks5.clone(),
            ecs_source: self.ecs.clone(),
            public_ip_service: self.ip_service.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_ips {
        bootstrap::print_local_addresses();
        return Ok(());
    }

    let config = bootstrap::load_config(cli.config.as_deref(), cli.overrides())?;

    if config.server.bind_address.trim().is_empty() {
        eprintln!("No listen address configured; choose one with --ip.");
        bootstrap::print_local_addresses();
        std::process::exit(1);
    }

    config.validate().context("Invalid configuration")?;

    bootstrap::init_logging(&config);

    info!("Starting ecs-forwarder v{}", env!("CARGO_PKG_VERSION"));

    let services = di::ForwardingServices::new(&config).await?;

    let listen_addr = config.listen_addr()?;
    let server = ForwardingServer::bind(listen_addr, services.forward_query.clone())
        .with_context(|| format!("Failed to bind {}", listen_addr))?;

    info!(
        listen = %listen_addr,
        upstream = %services.upstream,
        ecs = %services.ecs_subnet,
        "Ready"
    );

    let shutdown = CancellationToken::new();
    let mut server_task = tokio::spawn(server.run(shutdown.clone()));

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            shutdown.cancel();
            if let Err(e) = server_task.await {
                error!(error = %e, "DNS server task failed");
            }
        }
        result = &mut server_task => {
            if let Err(e) = result {
                error!(error = %e, "DNS server task failed");
            }
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
