//! HTTP front of the analyzer
//!
//! A tiny_http listener shared by a fixed pool of worker threads. Each
//! request is read fully, routed through [`handler::handle`] and answered;
//! nothing is shared between requests except the immutable analyzer.

pub mod config;
pub mod handler;

pub use config::ServerConfig;
pub use handler::{handle, IncomingRequest, Reply, RequestError};

use crate::analysis::Analyzer;
use crate::model::ANALYZE_PATH;
use anyhow::{Context, Result};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};

/// Bound analysis server, not yet serving
pub struct AnalysisServer {
    server: Arc<Server>,
    analyzer: Arc<Analyzer>,
    config: Arc<ServerConfig>,
}

impl AnalysisServer {
    /// Bind the listener described by `config`
    pub fn bind(config: ServerConfig, analyzer: Analyzer) -> Result<Self> {
        let server = Server::http(&config.bind_addr)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

        Ok(Self {
            server: Arc::new(server),
            analyzer: Arc::new(analyzer),
            config: Arc::new(config),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the process exits
    pub fn run(self) -> Result<()> {
        let handle = self.spawn()?;
        log::info!("Listening on http://{}{}", handle.display_addr(), ANALYZE_PATH);
        handle.join();
        Ok(())
    }

    /// Start the worker pool and return a handle that stops it
    pub fn spawn(self) -> Result<ServerHandle> {
        let stopping = Arc::new(AtomicBool::new(false));
        let addr = self.local_addr();
        let mut workers = Vec::with_capacity(self.config.workers);

        log::info!(
            "Starting {} worker(s), analyzer {}",
            self.config.workers,
            self.analyzer.describe()
        );

        for id in 0..self.config.workers {
            let server = Arc::clone(&self.server);
            let analyzer = Arc::clone(&self.analyzer);
            let config = Arc::clone(&self.config);
            let stopping = Arc::clone(&stopping);

            let worker = thread::Builder::new()
                .name(format!("analysis-worker-{}", id))
                .spawn(move || worker_loop(&server, &analyzer, &config, &stopping))
                .context("Failed to spawn worker thread")?;
            workers.push(worker);
        }

        Ok(ServerHandle {
            server: self.server,
            stopping,
            workers,
            addr,
        })
    }
}

/// Running server. Dropping the handle stops the workers.
pub struct ServerHandle {
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    addr: Option<SocketAddr>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Base URL of the analysis endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.display_addr(), ANALYZE_PATH)
    }

    fn display_addr(&self) -> String {
        self.addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    }

    /// Block until every worker exits
    pub fn join(mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Analysis worker panicked");
            }
        }
    }

    /// Stop accepting requests and wait for the workers
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.stopping.store(true, Ordering::SeqCst);
        for _ in 0..self.workers.len() {
            self.server.unblock();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Analysis worker panicked");
            }
        }
        log::info!("Analysis server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

const RECV_BACKOFF_START: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before the next `recv` after a failure: doubles, capped at one second
fn next_backoff(current: Option<Duration>) -> Duration {
    match current {
        None => RECV_BACKOFF_START,
        Some(delay) => delay.saturating_mul(2).min(RECV_BACKOFF_MAX),
    }
}

fn worker_loop(server: &Server, analyzer: &Analyzer, config: &ServerConfig, stopping: &AtomicBool) {
    let mut backoff = None;
    loop {
        match server.recv() {
            Ok(request) => {
                backoff = None;
                serve_one(request, analyzer, config);
            }
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                let delay = next_backoff(backoff);
                // Only the first failure of a run is worth a warning
                if backoff.is_none() {
                    log::warn!("Failed to receive request: {}", e);
                } else {
                    log::debug!("Failed to receive request: {} (retrying in {:?})", e, delay);
                }
                backoff = Some(delay);
                thread::sleep(delay);
            }
        }
    }
}

fn serve_one(mut request: Request, analyzer: &Analyzer, config: &ServerConfig) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    let reply = match read_body(&mut request, config.max_upload_bytes) {
        Ok(body) => handle(
            analyzer,
            &IncomingRequest {
                method: &method,
                url: &url,
                content_type: content_type.as_deref(),
                body: &body,
            },
        ),
        Err(err) => Reply::error(&err),
    };

    log::info!("{} {} -> {}", method, url, reply.status);

    let mut response = Response::from_string(reply.body.unwrap_or_default())
        .with_status_code(reply.status);
    if reply.status != 204 {
        add_header(&mut response, "Content-Type", "application/json");
    }
    if let Some(origin) = &config.allow_origin {
        add_header(&mut response, "Access-Control-Allow-Origin", origin);
        add_header(&mut response, "Access-Control-Allow-Methods", "POST, OPTIONS");
        add_header(&mut response, "Access-Control-Allow-Headers", "Content-Type");
    }

    if let Err(e) = request.respond(response) {
        log::warn!("Failed to send response for {}: {}", url, e);
    }
}

fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>, RequestError> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(RequestError::TooLarge { limit });
    }

    let mut body = Vec::new();
    let read = request
        .as_reader()
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut body);

    match read {
        Ok(_) if body.len() > limit => Err(RequestError::TooLarge { limit }),
        Ok(_) => Ok(body),
        Err(e) => {
            log::warn!("Failed to read request body: {}", e);
            Err(RequestError::BodyRead(e))
        }
    }
}

fn add_header<R: Read>(response: &mut Response<R>, field: &str, value: &str) {
    match Header::from_bytes(field.as_bytes(), value.as_bytes()) {
        Ok(header) => response.add_header(header),
        Err(()) => log::warn!("Invalid header {}: {}", field, value),
    }
}
