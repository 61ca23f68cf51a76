/// Embedder hooks for requests a normal document may hand off to the UA

use crate::Result;
use std::sync::{Mutex, PoisonError};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderRequest {
    OpenWindow(Url),
    Download(Url),
}

pub trait Embedder: Send + Sync {
    fn open_window(&self, url: &Url) -> Result<()>;
    fn download(&self, url: &Url) -> Result<()>;
}

/// Records requests in memory so tests can assert on them
pub struct RecordingEmbedder {
    requests: Mutex<Vec<EmbedderRequest>>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        RecordingEmbedder {
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<EmbedderRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, req: EmbedderRequest) {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(req);
    }
}

impl Default for RecordingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for RecordingEmbedder {
    fn open_window(&self, url: &Url) -> Result<()> {
        self.record(EmbedderRequest::OpenWindow(url.clone()));
        Ok(())
    }

    fn download(&self, url: &Url) -> Result<()> {
        self.record(EmbedderRequest::Download(url.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_embedder_keeps_order() {
        let e = RecordingEmbedder::new();
        let a = Url::parse("https://example.com/popup").unwrap();
        let b = Url::parse("https://example.com/file.zip").unwrap();
        e.open_window(&a).unwrap();
        e.download(&b).unwrap();
        assert_eq!(e.requests(), vec![EmbedderRequest::OpenWindow(a), EmbedderRequest::Download(b)]);
    }
}
