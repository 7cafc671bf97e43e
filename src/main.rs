use ble_battery_monitor::domain::models::UserIntent;
use ble_battery_monitor::domain::settings::SettingsService;
use ble_battery_monitor::infrastructure::bluetooth::{BtleTransport, TrackerService};
use ble_battery_monitor::infrastructure::logging;
use ble_battery_monitor::presentation::ConsoleView;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _log_guard = logging::init_logger(&settings.log_settings)?;
    info!(
        "Starting BLE Battery Monitor (settings: {})",
        settings_service.path().display()
    );

    let config = settings.tracker_config()?;
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();

    let transport = Arc::new(BtleTransport::new(config.service_uuid, event_tx).await?);
    if settings.scan_on_start {
        if let Err(e) = transport.start_scan().await {
            warn!("Could not start scanning: {}", e);
        }
    }

    let (service, mut view_rx) =
        TrackerService::new(transport.clone(), config, settings.request_timeout());
    let tracker = tokio::spawn(service.run(event_rx, intent_rx));

    // Ends when the tracker drops its view sender.
    let renderer = tokio::spawn(async move {
        loop {
            let view = view_rx.borrow_and_update().clone();
            for line in ConsoleView::render(&view) {
                println!("{}", line);
            }
            println!();
            if view_rx.changed().await.is_err() {
                break;
            }
        }
    });

    println!("Type a device address to select it, an empty line to deselect, q to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let intent = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match line.trim() {
                    "q" | "quit" => UserIntent::Shutdown,
                    "" => UserIntent::Select(None),
                    address => UserIntent::Select(Some(address.to_string())),
                },
                None => UserIntent::Shutdown,
            },
            _ = tokio::signal::ctrl_c() => UserIntent::Shutdown,
        };

        let shutdown = matches!(intent, UserIntent::Shutdown);
        if intent_tx.send(intent).is_err() || shutdown {
            break;
        }
    }
    drop(intent_tx);

    if let Err(e) = tracker.await {
        error!("Tracker task failed: {}", e);
    }
    let _ = renderer.await;

    if settings.scan_on_start {
        if let Err(e) = transport.stop_scan().await {
            warn!("Could not stop scanning: {}", e);
        }
    }
    info!("BLE Battery Monitor stopped");
    Ok(())
}
