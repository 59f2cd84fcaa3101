//! Server configuration

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
/// Default upload limit (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Configuration for the analysis server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., 127.0.0.1:3000, or port 0 for any free port)
    pub bind_addr: String,

    /// Number of worker threads pulling requests from the listener
    pub workers: usize,

    /// Uploads larger than this are rejected before analysis
    pub max_upload_bytes: usize,

    /// Value for Access-Control-Allow-Origin; None disables CORS headers
    pub allow_origin: Option<String>,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            workers: 4,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allow_origin: None,
        }
    }

    /// Set the worker count (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the upload limit
    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Set the upload limit in MiB, saturating at `usize::MAX` bytes
    pub fn with_max_upload_mb(self, mb: usize) -> Self {
        self.with_max_upload_bytes(mb.saturating_mul(1024 * 1024))
    }

    /// Answer cross-origin requests from `origin`
    pub fn with_allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = Some(origin.into());
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_limit_in_mib() {
        assert_eq!(ServerConfig::default().with_max_upload_mb(25).max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(ServerConfig::default().with_max_upload_mb(0).max_upload_bytes, 0);
    }

    #[test]
    fn test_huge_upload_limit_saturates() {
        let config = ServerConfig::default().with_max_upload_mb(usize::MAX);
        assert_eq!(config.max_upload_bytes, usize::MAX);
    }

    #[test]
    fn test_at_least_one_worker() {
        assert_eq!(ServerConfig::default().with_workers(0).workers, 1);
    }
}
