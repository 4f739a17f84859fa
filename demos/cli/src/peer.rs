//! relaychat peer
//!
//! Prompts for the shared passphrase, connects to a relay, then sends each
//! line read from stdin and prints incoming messages as `[xy] text`.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use relaychat::client::{IncomingMessage, PeerSession, SessionConfig, SessionError};
use relaychat::core::{RelayChatError, Result};
use relaychat::crypto::Passphrase;
use relaychat::transport::{PeerAddress, SenderTag, Shutdown};
use tokio::sync::mpsc;
use tracing::{error, info};

mod logging;

/// Interactive relaychat peer
#[derive(Parser, Debug)]
#[command(name = "relaychat-peer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay address (A.B.C.D:PORT)
    server: PeerAddress,

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
        Err(RelayChatError::Session(SessionError::Closed)) => {
            info!("Relay closed the connection");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn prompt_passphrase() -> Result<Passphrase> {
    print!("Passphrase: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(Passphrase::from_line(&line)?)
}

/// Forward stdin lines to the session until EOF.
fn spawn_stdin_reader(tx: mpsc::Sender<Vec<u8>>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line.into_bytes()).is_err() {
                break;
            }
        }
    });
}

async fn run(cli: Cli) -> Result<()> {
    // Address is already validated by clap, before the prompt
    let config = SessionConfig::with_address(cli.server, prompt_passphrase()?);

    let mut rng = StdRng::from_entropy();
    let tag = SenderTag::generate(&mut rng);
    println!("Your id is '{}'", tag);

    let mut session = PeerSession::connect(config, tag).await?;

    let (tx, mut rx) = mpsc::channel(32);
    spawn_stdin_reader(tx);

    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    let mut print = |message: IncomingMessage| println!("{}", message);
    session.run(&mut rx, &mut print, signal).await?;
    Ok(())
}
