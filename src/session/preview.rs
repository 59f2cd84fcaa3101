//! Preview resources for locally held clips
//!
//! A preview handle stands for a transient URL pointing at an in-memory
//! clip. Handles are released exactly once, when dropped. A
//! [`PreviewSlot`] holds at most one and releases the old handle whenever
//! a new clip is selected, so the last selection wins.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    live: Mutex<BTreeMap<u64, String>>,
}

/// Issues preview handles and tracks which are still alive
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Registry>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview URL for a clip
    pub fn create(&self, mime_type: &str) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("blob:cognisight/{}#{}", id, mime_type);

        if let Ok(mut live) = self.inner.live.lock() {
            live.insert(id, url.clone());
        }
        log::debug!("Created preview {}", url);

        PreviewHandle {
            id,
            url,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Number of previews not yet released
    pub fn live_count(&self) -> usize {
        self.inner.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

/// Owned preview URL. Dropping it releases the URL.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: Arc<Registry>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        let released = self
            .registry
            .live
            .lock()
            .map(|mut live| live.remove(&self.id).is_some())
            .unwrap_or(false);

        if released {
            log::debug!("Released preview {}", self.url);
        } else {
            log::warn!("Preview {} was already released", self.url);
        }
    }
}

/// Holds the preview of the current selection
#[derive(Debug, Default)]
pub struct PreviewSlot {
    current: Option<PreviewHandle>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new preview, releasing the previous one
    pub fn replace(&mut self, handle: PreviewHandle) {
        self.current = Some(handle);
    }

    /// Release the current preview, if any
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn url(&self) -> Option<&str> {
        self.current.as_ref().map(|h| h.url())
    }
}
