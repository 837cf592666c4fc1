use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use clap_derive::Subcommand;
use pdu_relay_rs::{
    Frame, PowerGlyph, RelayAction, RelayClient, RelayOptions, RelayTransport, Settings,
    SwitchController,
};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Print the current relay state
    Status,
    /// Switch the relay on
    On,
    /// Switch the relay off
    Off,
    /// Keep polling and print every state change
    Watch,
}

#[derive(Parser, Debug)]
struct Params {
    /// Hostname or IP address of the relay service
    #[clap(long, default_value = "127.0.0.1")]
    host: String,
    /// Port of the relay service
    #[clap(long, default_value = "5000")]
    port: u16,
    /// Settings file path (JSON); defaults are used when missing
    #[clap(long)]
    settings: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn describe(frame: &Frame) -> String {
    let power = match frame.power {
        PowerGlyph::On => "on",
        PowerGlyph::Off => "off",
        PowerGlyph::Unknown => "unknown",
    };
    if frame.offline {
        format!("{power} (offline)")
    } else {
        power.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::load(params.settings.as_deref());
    let options = RelayOptions::builder()
        .host(params.host)
        .port(params.port)
        .build()?;
    let client = RelayClient::new(options)?;

    match params.command {
        Commands::Status => {
            let status = client.status().await?;
            println!("relay is {}", if status.relay_on { "on" } else { "off" });
        }
        Commands::On => {
            let status = client.toggle(RelayAction::On).await?;
            println!("relay is {}", if status.relay_on { "on" } else { "off" });
        }
        Commands::Off => {
            let status = client.toggle(RelayAction::Off).await?;
            println!("relay is {}", if status.relay_on { "on" } else { "off" });
        }
        Commands::Watch => {
            let controller =
                SwitchController::with_press_flash(Arc::new(client), settings.press_flash());
            let mut frames = controller.subscribe();
            controller.spawn_poll_loop(settings.poll_interval());
            let mut last = None;
            loop {
                frames.changed().await?;
                let frame = frames.borrow_and_update().clone();
                let line = describe(&frame);
                if last.as_deref() != Some(line.as_str()) {
                    println!("relay is {line}");
                    last = Some(line);
                }
            }
        }
    }

    Ok(())
}
