//! HTTP status server.
//!
//! Serves the latest [`PeripheralStatus`] as JSON at `/status`.
//!
//! ```json
//! {
//!   "uptime_secs": 42,
//!   "device_name": "ESP32 BLE Demo",
//!   "service_uuid": "4fafc201-1fb5-459e-8fcc-c5c9c331914b",
//!   "characteristic_uuid": "beb5483e-36e1-4688-b7f5-ea07361b26a8",
//!   "connection": "connected",
//!   "advertising": "stopped",
//!   "peer": { "conn_handle": 1, "address": "11:22:33:44:55:66" },
//!   "value_len": 17,
//!   "counters": { "connections": 1, "reads": 1, ... }
//! }
//! ```

use super::stats::PeripheralStatus;
use crate::config::FOREGROUND_TICK;
use log::{error, info, warn};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Method, Response, Server};
use tokio::sync::watch;

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

const STATUS_PATH: &str = "/status";

#[derive(Serialize)]
struct StatusDocument<'a> {
    uptime_secs: u64,
    #[serde(flatten)]
    status: &'a PeripheralStatus,
}

/// What to send back for a request.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Json(String),
    Redirect,
    MethodNotAllowed,
    NotFound,
    Internal,
}

fn route(method: &Method, path: &str, status: &PeripheralStatus, uptime_secs: u64) -> Reply {
    if method != &Method::Get {
        return Reply::MethodNotAllowed;
    }
    match path {
        "/status" | "/status/" => {
            match serde_json::to_string(&StatusDocument { uptime_secs, status }) {
                Ok(json) => Reply::Json(json),
                Err(e) => {
                    error!("Failed to serialize status: {}", e);
                    Reply::Internal
                }
            }
        }
        "/" => Reply::Redirect,
        _ => Reply::NotFound,
    }
}

/// Runs in a background thread. Drop it to stop.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl StatusServer {
    /// Start serving `status` on `bind_addr:port` (`None` binds 0.0.0.0).
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        status: watch::Receiver<PeripheralStatus>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server.server_addr().to_ip();

        info!("Status server listening on http://{}{}", addr, STATUS_PATH);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || {
            Self::run_server(server, status, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server(server: Server, status: watch::Receiver<PeripheralStatus>, shutdown: Arc<AtomicBool>) {
        let started = Instant::now();
        let content_type = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("static header");
        let location =
            Header::from_bytes(&b"Location"[..], STATUS_PATH.as_bytes()).expect("static header");
        let allow_get = Header::from_bytes(&b"Allow"[..], &b"GET"[..]).expect("static header");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            let request = match server.recv_timeout(FOREGROUND_TICK) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    error!("Status server error: {}", e);
                    break;
                }
            };

            let snapshot = status.borrow().clone();
            let reply = route(
                request.method(),
                request.url(),
                &snapshot,
                started.elapsed().as_secs(),
            );
            let result = match reply {
                Reply::Json(json) => request.respond(
                    Response::from_string(json)
                        .with_header(content_type.clone())
                        .with_status_code(200),
                ),
                Reply::Redirect => request.respond(
                    Response::from_string("See /status for peripheral status")
                        .with_status_code(302)
                        .with_header(location.clone()),
                ),
                Reply::MethodNotAllowed => request.respond(
                    Response::from_string("Method Not Allowed")
                        .with_status_code(405)
                        .with_header(allow_get.clone()),
                ),
                Reply::NotFound => {
                    request.respond(Response::from_string("Not Found").with_status_code(404))
                }
                Reply::Internal => request
                    .respond(Response::from_string("Internal Server Error").with_status_code(500)),
            };
            if let Err(e) = result {
                warn!("Failed to send response: {}", e);
            }
        }
    }

    /// Stop the server. May take up to one poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}
