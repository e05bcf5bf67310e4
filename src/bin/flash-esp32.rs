//! Build the peripheral for ESP32 and flash it.
//!
//! Usage: cargo run --bin flash-esp32 [-- --no-monitor]
//!
//! Set `PORT` to pick the serial device; otherwise espflash asks or
//! auto-detects.

use std::process::{exit, Command};

const TARGET: &str = "xtensa-esp32-espidf";
const BIN: &str = "peripheral";

fn espflash_installed() -> bool {
    Command::new("espflash")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn flash_args(image: &str, port: Option<&str>, monitor: bool) -> Vec<String> {
    let mut args = vec!["flash".to_string()];
    if let Some(port) = port {
        args.push("--port".to_string());
        args.push(port.to_string());
    }
    if monitor {
        args.push("--monitor".to_string());
    }
    args.push(image.to_string());
    args
}

fn main() {
    let monitor = !std::env::args().any(|arg| arg == "--no-monitor");
    let port = std::env::var("PORT").ok().filter(|p| !p.is_empty());

    // Check the flasher before building
    if !espflash_installed() {
        eprintln!("espflash not found. Install with: cargo install espflash");
        exit(1);
    }

    println!("=== Building {} for ESP32 ===\n", BIN);

    let status = Command::new("cargo")
        .args([
            "build",
            "--bin",
            BIN,
            "--release",
            "--target",
            TARGET,
            "--features",
            "esp32",
        ])
        .status();

    if !matches!(status, Ok(s) if s.success()) {
        eprintln!("\nBuild failed!");
        exit(1);
    }

    match &port {
        Some(port) => println!("\n=== Flashing to device ({}) ===\n", port),
        None => println!("\n=== Flashing to device ===\n"),
    }

    let image = format!("target/{}/release/{}", TARGET, BIN);
    let status = Command::new("espflash")
        .args(flash_args(&image, port.as_deref(), monitor))
        .status();

    if !matches!(status, Ok(s) if s.success()) {
        eprintln!("\nFlash failed!");
        exit(1);
    }
}
