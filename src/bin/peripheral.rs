//! BLE demo peripheral binary.
//!
//! Runs on both ESP32 and host platforms:
//! - **Host**: `cargo run --bin peripheral` (simulated radio, console plays the phone)
//! - **ESP32**: `cargo run --bin flash-esp32`
//!
//! ## Console Commands (host)
//!
//! - `connect` / `disconnect` - Open or close the connection
//! - `read` / `write <text>` - Access the characteristic
//! - `notify <text>` - Notify a new value
//! - `status` - Show peripheral status
//! - `help` - Show help
//!
//! ## Endpoints (host)
//!
//! - Status: http://localhost:8080/status

use ble_demo_esp32::{bootstrap, Bootstrapped, PeripheralConfig};
use log::{error, info};
use tokio_util::sync::CancellationToken;

// ESP32: Initialize ESP-IDF before anything else
#[cfg(feature = "esp32")]
fn platform_init() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("ESP-IDF initialized");
}

// Host: Just initialize env_logger
#[cfg(not(feature = "esp32"))]
fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    platform_init();

    info!("=== BLE peripheral starting ===");

    let config = PeripheralConfig::default();

    #[cfg(feature = "esp32")]
    run_device(config).await;

    #[cfg(not(feature = "esp32"))]
    run_host(config).await;

    info!("Shutdown complete");
}

#[cfg(feature = "esp32")]
async fn run_device(config: PeripheralConfig) {
    use ble_demo_esp32::nimble::NimbleStack;

    info!("Platform: ESP32");

    let mut stack = NimbleStack::take(config.advertising.preferred_interval);
    let Bootstrapped {
        mut peripheral,
        mut events,
        sender,
    } = match bootstrap(&mut stack, &config) {
        Ok(booted) => booted,
        Err(e) => {
            error!("BLE bootstrap failed: {}", e);
            return;
        }
    };

    // Held so the queue stays open for application notifications
    let _app = sender;
    peripheral.run(&mut events, CancellationToken::new()).await;
}

#[cfg(not(feature = "esp32"))]
async fn run_host(config: PeripheralConfig) {
    use ble_demo_esp32::console::{Console, ConsoleCommand, HELP_TEXT};
    use ble_demo_esp32::sim::{SimulatedCentral, SimulatedStack};
    use ble_demo_esp32::{StatusServer, DEFAULT_STATUS_PORT};
    use log::warn;
    use std::io::BufRead;

    const HOST_CENTRAL_ADDRESS: &str = "11:22:33:44:55:66";

    info!("Platform: Host (simulated radio)");

    let mut stack = SimulatedStack::new();
    let Bootstrapped {
        mut peripheral,
        mut events,
        sender,
    } = match bootstrap(&mut stack, &config) {
        Ok(booted) => booted,
        Err(e) => {
            error!("BLE bootstrap failed: {}", e);
            return;
        }
    };

    let _status_server =
        match StatusServer::start(None, DEFAULT_STATUS_PORT, peripheral.subscribe_status()) {
            Ok(server) => {
                info!(
                    "Status server at http://localhost:{}/status",
                    DEFAULT_STATUS_PORT
                );
                Some(server)
            }
            Err(e) => {
                warn!("Failed to start status server: {}", e);
                None
            }
        };

    let console = Console::new(
        stack.clone(),
        SimulatedCentral::new(&stack, HOST_CENTRAL_ADDRESS),
        sender,
        peripheral.subscribe_status(),
    );

    print_console("");
    print_console(&format!("=== {} ===", config.identity.device_name));
    print_console(HELP_TEXT.trim());
    print_console("");
    print_prompt();

    let cancel = CancellationToken::new();
    let stdin_cancel = cancel.clone();
    let stdin_task = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        let rt = tokio::runtime::Handle::current();

        while !stdin_cancel.is_cancelled() {
            match lines.next() {
                Some(Ok(line)) => {
                    let output = rt.block_on(console.execute(ConsoleCommand::parse(&line)));
                    print_console(&output);
                    print_prompt();
                }
                Some(Err(e)) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
                None => break,
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            print_console("\nShutting down...");
        }
        _ = peripheral.run(&mut events, cancel.clone()) => {}
        result = stdin_task => {
            if let Err(e) = result {
                error!("Console task error: {}", e);
            }
        }
    }
    cancel.cancel();
}

#[cfg(not(feature = "esp32"))]
fn print_console(msg: &str) {
    use std::io::Write;
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

#[cfg(not(feature = "esp32"))]
fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}
