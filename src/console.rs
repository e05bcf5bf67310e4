//! Interactive console for driving the simulated peripheral from a terminal.
//!
//! The host build has no radio, so the console plays the phone: each command
//! acts through a [`SimulatedCentral`] and the result is printed back.
//!
//! # Commands
//!
//! - `scan` - Show the advertisement, if the peripheral is discoverable
//! - `connect` / `disconnect` - Open or close the connection
//! - `discover` - Look up the characteristic in the advertised service
//! - `read` - Read the characteristic
//! - `write <text>` - Write the characteristic
//! - `subscribe` - Enable notifications
//! - `notify <text>` - Have the peripheral notify a new value
//! - `inbox` - Show notifications received so far
//! - `status` - Show peripheral status
//! - `fail-adv on|off` - Make advertising restarts fail
//! - `help` - Show available commands
//!
//! # Example Session
//!
//! ```text
//! > connect
//! Connected as 11:22:33:44:55:66 (handle 1)
//!
//! > write hello
//! Wrote 5 bytes
//!
//! > read
//! Read: "Hello from ESP32!"
//! ```

use crate::peripheral::{format_value, EventSender};
use crate::sim::{SimulatedCentral, SimulatedStack};
use crate::status::PeripheralStatus;
use tokio::sync::watch;

/// Parsed console command.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    Connect,
    Disconnect,
    Discover,
    Read,
    Write { text: String },
    Subscribe,
    Notify { text: String },
    Inbox,
    Status,
    FailAdvertising(bool),
    Help,
    /// Unknown or invalid command.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return ConsoleCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match cmd.to_lowercase().as_str() {
            "scan" => ConsoleCommand::Scan,
            "connect" | "c" => ConsoleCommand::Connect,
            "disconnect" | "d" => ConsoleCommand::Disconnect,
            "discover" => ConsoleCommand::Discover,
            "read" | "r" => ConsoleCommand::Read,
            "write" | "w" => {
                if args.is_empty() {
                    ConsoleCommand::Unknown("Usage: write <text>".to_string())
                } else {
                    ConsoleCommand::Write {
                        text: args.to_string(),
                    }
                }
            }
            "subscribe" | "sub" => ConsoleCommand::Subscribe,
            "notify" | "n" => {
                if args.is_empty() {
                    ConsoleCommand::Unknown("Usage: notify <text>".to_string())
                } else {
                    ConsoleCommand::Notify {
                        text: args.to_string(),
                    }
                }
            }
            "inbox" | "i" => ConsoleCommand::Inbox,
            "status" | "stat" | "s" => ConsoleCommand::Status,
            "fail-adv" => match args.to_lowercase().as_str() {
                "on" => ConsoleCommand::FailAdvertising(true),
                "off" => ConsoleCommand::FailAdvertising(false),
                _ => ConsoleCommand::Unknown("Usage: fail-adv on|off".to_string()),
            },
            "help" | "h" | "?" => ConsoleCommand::Help,
            _ => ConsoleCommand::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  scan               Show the advertisement (if discoverable)
  connect            Connect to the peripheral
  disconnect         Disconnect from the peripheral
  discover           Look up the characteristic
  read               Read the characteristic
  write <text>       Write the characteristic
  subscribe          Enable notifications
  notify <text>      Have the peripheral notify <text>
  inbox              Show received notifications
  status             Show peripheral status
  fail-adv on|off    Make advertising restarts fail
  help               Show this help

Shortcuts: c=connect, d=disconnect, r=read, w=write, n=notify, s=status, h=help
"#;

/// Format a status snapshot for display.
pub fn format_status(status: &PeripheralStatus) -> String {
    let peer = status
        .peer
        .as_ref()
        .map(|p| format!(" ({})", p))
        .unwrap_or_default();
    format!(
        "Peripheral Status:\n  Name: {}\n  Service: {}\n  Characteristic: {}\n  Connection: {}{}\n  Advertising: {}\n  Value: {} bytes\n  Reads: {}  Writes: {} ({} empty)  Notifications: {}\n  Connections: {}  Restarts: {}  Restart failures: {}\n",
        status.device_name,
        status.service_uuid,
        status.characteristic_uuid,
        status.connection,
        peer,
        status.advertising,
        status.value_len,
        status.counters.reads,
        status.counters.writes,
        status.counters.empty_writes,
        status.counters.notifications,
        status.counters.connections,
        status.counters.advertising_restarts,
        status.counters.advertising_failures,
    )
}

/// Executes console commands against a simulated central.
pub struct Console {
    stack: SimulatedStack,
    central: SimulatedCentral,
    app: EventSender,
    status: watch::Receiver<PeripheralStatus>,
}

impl Console {
    /// Create a console acting as `central`.
    pub fn new(
        stack: SimulatedStack,
        central: SimulatedCentral,
        app: EventSender,
        status: watch::Receiver<PeripheralStatus>,
    ) -> Self {
        Self {
            stack,
            central,
            app,
            status,
        }
    }

    /// Run one command and return what to print.
    pub async fn execute(&self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Scan => match self.central.scan() {
                Some(adv) => {
                    let services: Vec<String> =
                        adv.service_uuids.iter().map(|u| u.to_string()).collect();
                    format!("Found {:?} advertising [{}]", adv.device_name, services.join(", "))
                }
                None => "Nothing advertising".to_string(),
            },
            ConsoleCommand::Connect => match self.central.connect() {
                Ok(peer) => format!("Connected as {}", peer),
                Err(e) => format!("Connect failed: {}", e),
            },
            ConsoleCommand::Disconnect => match self.central.disconnect() {
                Ok(()) => "Disconnected".to_string(),
                Err(e) => format!("Disconnect failed: {}", e),
            },
            ConsoleCommand::Discover => {
                let service = self.status.borrow().service_uuid;
                match self.central.discover(service) {
                    Ok(c) => format!(
                        "Characteristic {} [{}] cccd={} value={}",
                        c.uuid,
                        c.capabilities,
                        c.has_cccd,
                        format_value(&c.value)
                    ),
                    Err(e) => format!("Discover failed: {}", e),
                }
            }
            ConsoleCommand::Read => match self.central.read() {
                Ok(value) => format!("Read: {}", format_value(&value)),
                Err(e) => format!("Read failed: {}", e),
            },
            ConsoleCommand::Write { text } => match self.central.write(text.as_bytes()) {
                Ok(()) => format!("Wrote {} bytes", text.len()),
                Err(e) => format!("Write failed: {}", e),
            },
            ConsoleCommand::Subscribe => match self.central.subscribe() {
                Ok(()) => "Subscribed".to_string(),
                Err(e) => format!("Subscribe failed: {}", e),
            },
            ConsoleCommand::Notify { text } => match self.app.notify(text.into_bytes()) {
                Ok(()) => "Notification queued".to_string(),
                Err(e) => format!("Notify failed: {}", e),
            },
            ConsoleCommand::Inbox => {
                let received = self.central.notifications();
                if received.is_empty() {
                    return "No notifications received".to_string();
                }
                let mut output = String::from("Notifications:\n");
                for (idx, value) in received.iter().enumerate() {
                    output.push_str(&format!("  [{}] {}\n", idx, format_value(value)));
                }
                output
            }
            ConsoleCommand::Status => format_status(&self.status.borrow()),
            ConsoleCommand::FailAdvertising(fail) => {
                self.stack.fail_advertising_start(fail);
                if fail {
                    "Advertising restarts will fail".to_string()
                } else {
                    "Advertising restarts will succeed".to_string()
                }
            }
            ConsoleCommand::Help => HELP_TEXT.to_string(),
            ConsoleCommand::Unknown(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeripheralConfig;
    use crate::peripheral::bootstrap;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ConsoleCommand::parse("scan"), ConsoleCommand::Scan);
        assert_eq!(ConsoleCommand::parse("c"), ConsoleCommand::Connect);
        assert_eq!(ConsoleCommand::parse("DISCONNECT"), ConsoleCommand::Disconnect);
        assert_eq!(ConsoleCommand::parse("  read  "), ConsoleCommand::Read);
        assert_eq!(ConsoleCommand::parse("sub"), ConsoleCommand::Subscribe);
        assert_eq!(ConsoleCommand::parse("?"), ConsoleCommand::Help);
    }

    #[test]
    fn test_parse_write_keeps_spaces() {
        assert_eq!(
            ConsoleCommand::parse("write hello  world"),
            ConsoleCommand::Write {
                text: "hello  world".to_string()
            }
        );
        assert!(matches!(ConsoleCommand::parse("write"), ConsoleCommand::Unknown(_)));
        assert!(matches!(ConsoleCommand::parse("notify "), ConsoleCommand::Unknown(_)));
    }

    #[test]
    fn test_parse_fail_adv() {
        assert_eq!(
            ConsoleCommand::parse("fail-adv on"),
            ConsoleCommand::FailAdvertising(true)
        );
        assert_eq!(
            ConsoleCommand::parse("fail-adv OFF"),
            ConsoleCommand::FailAdvertising(false)
        );
        assert!(matches!(ConsoleCommand::parse("fail-adv maybe"), ConsoleCommand::Unknown(_)));
    }

    #[test]
    fn test_parse_unknown() {
        match ConsoleCommand::parse("frobnicate") {
            ConsoleCommand::Unknown(msg) => assert!(msg.contains("frobnicate")),
            other => panic!("expected Unknown, got {:?}", other),
        }
        assert_eq!(ConsoleCommand::parse(""), ConsoleCommand::Unknown(String::new()));
    }

    #[test]
    fn test_format_status() {
        let status = PeripheralStatus::initial(&PeripheralConfig::default());
        let text = format_status(&status);
        assert!(text.contains("Name: ESP32 BLE Demo"));
        assert!(text.contains("Connection: disconnected\n"));
        assert!(text.contains("Value: 13 bytes"));
    }

    #[tokio::test]
    async fn test_console_session() {
        let mut stack = SimulatedStack::new();
        let booted = bootstrap(&mut stack, &PeripheralConfig::default()).unwrap();
        let mut peripheral = booted.peripheral;
        let mut events = booted.events;
        let console = Console::new(
            stack.clone(),
            SimulatedCentral::new(&stack, "11:22:33:44:55:66"),
            booted.sender,
            peripheral.subscribe_status(),
        );

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let consumer = tokio::spawn(async move {
            peripheral.run(&mut events, stop).await;
        });

        assert!(console
            .execute(ConsoleCommand::Scan)
            .await
            .contains("ESP32 BLE Demo"));
        assert_eq!(
            console.execute(ConsoleCommand::Connect).await,
            "Connected as 11:22:33:44:55:66 (handle 1)"
        );
        assert_eq!(console.execute(ConsoleCommand::Scan).await, "Nothing advertising");
        assert_eq!(
            console
                .execute(ConsoleCommand::Write {
                    text: "hello".to_string()
                })
                .await,
            "Wrote 5 bytes"
        );
        assert_eq!(
            console.execute(ConsoleCommand::Read).await,
            "Read: \"Hello from ESP32!\""
        );

        cancel.cancel();
        consumer.await.unwrap();
    }
}
