//! relaychat relay
//!
//! Listens on one port and forwards every frame from one peer to all others.
//! Stops on Ctrl-C.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use clap::Parser;
use relaychat::core::Result;
use relaychat::server::{Relay, RelayConfigBuilder};
use relaychat::transport::Shutdown;
use tracing::{error, info};

mod logging;

/// Broadcast relay for relaychat peers
#[derive(Parser, Debug)]
#[command(name = "relaychat-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RelayConfigBuilder::new()
        .bind_addr(SocketAddr::new(cli.bind, cli.port))
        .build()?;
    let relay = Relay::bind(config).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.trigger();
        }
    });

    let stats = relay.run(signal).await?;
    info!(
        accepted = stats.accepted,
        refused = stats.refused,
        frames = stats.frames_forwarded,
        bytes = stats.bytes_forwarded,
        "Relay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_zero_rejected() {
        assert!(Cli::try_parse_from(["relaychat-relay", "0"]).is_err());
        assert!(Cli::try_parse_from(["relaychat-relay", "65536"]).is_err());

        let cli = Cli::try_parse_from(["relaychat-relay", "4040"]).unwrap();
        assert_eq!(cli.port, 4040);
        assert_eq!(cli.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
