mod bridge;
mod config;
mod media;
mod mqtt;
mod registration;
mod router;
mod speaker;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use bridge::Bridge;
use media::MediaCatalog;
use mqtt::client::{MqttClient, MqttMessage, MqttPublish};
use registration::{DeviceStore, RegistrationForm};
use speaker::adapter::{SpeakerAdapter, SpeakerControl};
use speaker::http::DeviceClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bridge ESP32 audio speakers between MQTT and their HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge (default).
    Run,
    /// Register a speaker in the device store.
    Register {
        #[arg(long, default_value = registration::DEFAULT_NAME)]
        name: String,
        #[arg(long, default_value = registration::DEFAULT_DEVICE_ID)]
        device_id: String,
        #[arg(long, default_value = registration::DEFAULT_HOST)]
        host: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await,
        Command::Register {
            name,
            device_id,
            host,
        } => register(RegistrationForm {
            name,
            device_id,
            host,
        }),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn register(form: RegistrationForm) -> Result<(), String> {
    let path = config::devices_file_from_env();
    let mut store = DeviceStore::load(&path)?;
    let record = registration::submit(&mut store, form).map_err(|e| e.to_string())?;
    store.save(&path)?;
    info!("Saved '{}' to {}", record.title(), path.display());
    Ok(())
}

async fn run() -> Result<(), String> {
    let config = config::Config::from_env().map_err(|e| format!("Configuration error: {e}"))?;

    let store = DeviceStore::load(&config.devices_file)?;
    if store.is_empty() {
        return Err(format!(
            "No devices registered in {}",
            config.devices_file.display()
        ));
    }

    let catalog = match &config.media_catalog_file {
        Some(path) => MediaCatalog::load(path)?,
        None => MediaCatalog::default(),
    };
    let catalog = Arc::new(catalog);

    info!(
        "Starting esp32-audio-bridge (mqtt={}:{}, devices={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        store.len(),
    );

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<MqttMessage>(100);
    let (outbound_tx, outbound_rx) = mpsc::channel::<MqttPublish>(100);

    let http = reqwest::Client::new();
    let mut bridge = Bridge::new(&config.mqtt.topic_prefix, outbound_tx);

    for device in store.devices() {
        info!("  Device: {} ({}) at {}", device.name, device.device_id, device.host);

        let client =
            DeviceClient::new(http.clone(), device.host.clone()).with_timeout(config.http.timeout());
        let control = SpeakerControl::new(client, catalog.clone(), catalog.clone());
        bridge.attach(SpeakerAdapter::new(device.clone(), control));
    }

    let mqtt_client = MqttClient::new(&config, bridge.subscriptions());
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(inbound_tx, outbound_rx).await;
    });

    bridge.publish_all();

    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| format!("Failed to register SIGTERM handler: {e}"))?;

    // Main loop: the only owner of adapter state.
    loop {
        tokio::select! {
            Some(msg) = inbound_rx.recv() => {
                bridge.handle(msg);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    mqtt_handle.abort();
    info!("esp32-audio-bridge stopped");
    Ok(())
}
