// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! RFCOMM Messenger terminal front-end

use anyhow::{anyhow, Context, Result};
use bluer::Address;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfcomm_messenger::{
    Config, ConnectionManager, EventProcessor, PeerIdentifier, RfcommTransport, Transport,
};

/// How long to wait for the final notifications after the session ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "rfcomm-messenger", version, about = "Text messaging over Bluetooth RFCOMM")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List paired devices.
    Devices,
    /// Connect to a device and start chatting.
    Connect {
        /// Bluetooth address, e.g. 00:11:22:33:44:55.
        address: String,
    },
    /// Wait for one device to connect and start chatting.
    Listen,
}

enum Mode {
    Connect(PeerIdentifier),
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("rfcomm_messenger={}", level).parse()?),
        )
        .init();

    info!("Starting RFCOMM Messenger v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load(cli.config.as_deref())?;
    debug!("Configuration loaded: {:?}", config);

    let transport = RfcommTransport::new(&config.bluetooth).await?;

    match cli.command {
        Command::Devices => list_devices(&transport).await,
        Command::Connect { address } => {
            let address: Address = address
                .parse()
                .map_err(|_| anyhow!("Invalid Bluetooth address: {}", address))?;
            let peer = transport.resolve(address).await;
            run(transport, config, Mode::Connect(peer)).await
        }
        Command::Listen => run(transport, config, Mode::Listen).await,
    }
}

async fn list_devices(transport: &RfcommTransport) -> Result<()> {
    let devices = transport.paired_devices().await?;
    if devices.is_empty() {
        println!("No paired devices");
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

async fn run(transport: RfcommTransport, config: Config, mode: Mode) -> Result<()> {
    let mut manager = ConnectionManager::new(transport, config.link);
    let mut events = manager
        .take_event_receiver()
        .context("Event receiver already taken")?;

    // Print every event; stop after the session is gone
    let session_over = CancellationToken::new();
    let printer_done = session_over.clone();
    let printer = tokio::spawn(async move {
        let mut processor = EventProcessor::new(std::io::stdout());
        while let Some(event) = events.recv().await {
            match processor.process_event(&event) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("Failed to write notification: {}", e);
                    break;
                }
            }
        }
        printer_done.cancel();
    });

    let establish = async {
        match &mode {
            Mode::Connect(peer) => manager.connect_as_client(peer).await,
            Mode::Listen => manager.listen_as_server().await,
        }
    };
    let session = tokio::select! {
        session = establish => session?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            return Ok(());
        }
    };

    chat(&manager, &session_over).await?;

    session.disconnect();
    if tokio::time::timeout(DRAIN_TIMEOUT, printer).await.is_err() {
        debug!("Event printer did not finish in time");
    }

    info!("RFCOMM Messenger stopped");
    Ok(())
}

/// Forward stdin lines to the peer until the session ends.
async fn chat<T: Transport>(
    manager: &ConnectionManager<T>,
    session_over: &CancellationToken,
) -> Result<()> {
    let dispatcher = manager.dispatcher();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    // Failures are reported through the SendFailed event
                    if let Err(e) = dispatcher.send(&line).await {
                        debug!("Send failed: {}", e);
                    }
                }
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = session_over.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
