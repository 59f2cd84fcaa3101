use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Reader that fails once its token is cancelled, aborting the transfer
/// it feeds
pub(crate) struct CancellableReader<R> {
    inner: R,
    token: Option<CancellationToken>,
}

impl<R> CancellableReader<R> {
    pub(crate) fn new(inner: R, token: Option<CancellationToken>) -> Self {
        Self { inner, token }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(io::Error::other("request cancelled"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_reader_stops_once_cancelled() {
        let token = CancellationToken::new();
        let mut reader = CancellableReader::new(Cursor::new(vec![1u8; 8]), Some(token.clone()));

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);

        token.cancel();
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_reader_without_token_reads_everything() {
        let mut reader = CancellableReader::new(Cursor::new(vec![1u8; 8]), None);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 8);
    }
}
