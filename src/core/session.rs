//! Publishing document generations.
//!
//! Readers always see a complete generation: a reparse builds its document
//! off to the side and swaps it in with one write. When reparses overlap,
//! the one started last wins and older results are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::document::{BuildDocument, ParseEnvironment};
use crate::utils::error::FsError;

#[derive(Debug, Default)]
struct Published {
    generation: u64,
    document: Option<Arc<BuildDocument>>,
}

/// The live state of one edited document.
#[derive(Debug)]
pub struct DocumentSession {
    filename: String,
    env: ParseEnvironment,
    published: RwLock<Published>,
    started: AtomicU64,
}

impl DocumentSession {
    pub fn new(filename: impl Into<String>, env: ParseEnvironment) -> Self {
        Self {
            filename: filename.into(),
            env,
            published: RwLock::new(Published::default()),
            started: AtomicU64::new(0),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn env(&self) -> &ParseEnvironment {
        &self.env
    }

    /// The latest published generation.
    pub fn current(&self) -> Option<Arc<BuildDocument>> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        published.document.clone()
    }

    /// Number of the latest published generation; 0 before the first.
    pub fn generation(&self) -> u64 {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        published.generation
    }

    /// Reserve the number of a new generation.
    pub fn begin(&self) -> u64 {
        self.started.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish `document` as `generation` unless a later one is already
    /// published. Returns whether it was published.
    pub fn publish_if_newer(&self, generation: u64, document: BuildDocument) -> bool {
        let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
        if generation <= published.generation {
            debug!(
                file = %self.filename,
                generation,
                current = published.generation,
                "discarding superseded generation"
            );
            return false;
        }
        published.generation = generation;
        published.document = Some(Arc::new(document));
        true
    }

    /// Parse `text` as the next generation, reusing the current one's
    /// imports, and publish it. Returns whatever is current afterwards.
    pub fn reparse(&self, text: &str) -> Option<Arc<BuildDocument>> {
        let generation = self.begin();
        let previous = self.current();
        let document = BuildDocument::parse(&self.filename, text, previous.as_deref(), &self.env);
        self.publish_if_newer(generation, document);
        self.current()
    }

    /// Like [`reparse`](Self::reparse), reading the text from disk.
    pub fn reload(&self) -> Result<Option<Arc<BuildDocument>>, FsError> {
        let generation = self.begin();
        let previous = self.current();
        let document = BuildDocument::load(&self.filename, previous.as_deref(), &self.env)?;
        self.publish_if_newer(generation, document);
        Ok(self.current())
    }
}
