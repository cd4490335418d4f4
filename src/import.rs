//! Media import: turn picked items into decoded previews.
//!
//! The picker hands over opaque [`PickedItem`] handles. Each one is loaded
//! and decoded as its own task in a [`JoinSet`]; results are consumed one at
//! a time as they complete, so the preview list and the failure list are
//! only ever touched from the consuming loop.
//!
//! ```text
//! items ──spawn──▶ [load_bytes → decode] ─┐
//!       ──spawn──▶ [load_bytes → decode] ─┼─ join_next ─▶ ImportOutcome
//!       ──spawn──▶ [load_bytes → decode] ─┘
//! ```
//!
//! ## Failure policy
//!
//! - [`FailurePolicy::FailFast`]: the first failure stops consumption and
//!   aborts every task still in flight. Previews that completed before the
//!   failure are kept; which ones those are depends on completion order.
//! - [`FailurePolicy::SkipFailed`]: failures are recorded and consumption
//!   carries on, so every successful item ends up in the outcome.
//!
//! Either way the user sees one message, [`LOAD_FAILED_MESSAGE`]; the
//! specific cause is logged.
//!
//! An item whose payload is absent (`Ok(None)`) is skipped without an error.
//! An item that loads but does not decode is a failure.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinSet;

/// The only user-visible import error.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load one or more images.";

/// Error from a picker item's own transfer.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transfer failed: {0}")]
    Failed(String),
}

/// Why one item did not produce a preview.
#[derive(Error, Debug)]
pub enum ImportFailure {
    #[error("Failed to load {item}: {source}")]
    Transfer {
        item: String,
        #[source]
        source: TransferError,
    },
    #[error("Failed to decode {item}: {source}")]
    Decode {
        item: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Import task did not finish: {0}")]
    Task(String),
}

/// A handle returned by the media picker.
#[async_trait]
pub trait PickedItem: Send + Sync {
    /// Short human-readable name used in logs and failures.
    fn describe(&self) -> String;

    /// Fetch the raw payload. `Ok(None)` means the item has nothing to transfer.
    async fn load_bytes(&self) -> Result<Option<Vec<u8>>, TransferError>;
}

/// A picked file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileItem {
    path: PathBuf,
}

impl FileItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PickedItem for FileItem {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load_bytes(&self) -> Result<Option<Vec<u8>>, TransferError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(Some(bytes))
    }
}

/// How the import reacts to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure and abort the remaining loads.
    #[default]
    FailFast,
    /// Record failures and keep every item that does load.
    SkipFailed,
}

/// A decoded image ready for display, with the bytes it came from.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Position of the item in the selection.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Container format sniffed from the payload, if recognized.
    pub format: Option<ImageFormat>,
    /// Raw payload, persisted as-is on save.
    pub bytes: Vec<u8>,
    pub image: DynamicImage,
}

/// Result of one import run.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Successful previews, in selection order.
    pub previews: Vec<Preview>,
    pub failures: Vec<ImportFailure>,
    /// Items that had no payload to transfer.
    pub skipped: usize,
}

impl ImportOutcome {
    /// The message to show, if anything failed.
    pub fn error_message(&self) -> Option<&'static str> {
        if self.failures.is_empty() {
            None
        } else {
            Some(LOAD_FAILED_MESSAGE)
        }
    }

    /// Raw bytes of the last successful preview.
    pub fn image_bytes(&self) -> Option<&[u8]> {
        self.previews.last().map(|p| p.bytes.as_slice())
    }
}

/// Loads picked items concurrently under a [`FailurePolicy`].
#[derive(Debug, Clone)]
pub struct Importer {
    policy: FailurePolicy,
    max_selection: usize,
}

impl Importer {
    /// A `max_selection` of zero is raised to one.
    pub fn new(policy: FailurePolicy, max_selection: usize) -> Self {
        Self {
            policy,
            max_selection: max_selection.max(1),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn max_selection(&self) -> usize {
        self.max_selection
    }

    /// Load and decode `items`.
    ///
    /// Items past `max_selection` are dropped before anything is loaded.
    pub async fn import(&self, mut items: Vec<Box<dyn PickedItem>>) -> ImportOutcome {
        if items.len() > self.max_selection {
            tracing::warn!(
                selected = items.len(),
                limit = self.max_selection,
                "selection exceeds limit, extra items ignored"
            );
            items.truncate(self.max_selection);
        }

        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            tasks.spawn(load_one(index, item));
        }

        let mut outcome = ImportOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(ImportFailure::Task(e.to_string())));
            match result {
                Ok(Some(preview)) => {
                    tracing::debug!(
                        index = preview.index,
                        width = preview.width,
                        height = preview.height,
                        "loaded preview"
                    );
                    outcome.previews.push(preview);
                }
                Ok(None) => outcome.skipped += 1,
                Err(failure) => {
                    tracing::warn!(error = %failure, "import failed");
                    outcome.failures.push(failure);
                    if self.policy == FailurePolicy::FailFast {
                        tasks.abort_all();
                        break;
                    }
                }
            }
        }

        outcome.previews.sort_by_key(|p| p.index);
        outcome
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(FailurePolicy::default(), 1)
    }
}

async fn load_one(
    index: usize,
    item: Box<dyn PickedItem>,
) -> Result<Option<Preview>, ImportFailure> {
    let label = item.describe();
    let bytes = match item.load_bytes().await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(item = %label, "picked item has no payload");
            return Ok(None);
        }
        Err(source) => return Err(ImportFailure::Transfer { item: label, source }),
    };

    // Decoding is CPU-bound; keep it off the async workers.
    let (bytes, decoded) = tokio::task::spawn_blocking(move || {
        let decoded = image::load_from_memory(&bytes);
        (bytes, decoded)
    })
    .await
    .map_err(|e| ImportFailure::Task(e.to_string()))?;

    let image = decoded.map_err(|source| ImportFailure::Decode {
        item: label,
        source,
    })?;
    Ok(Some(Preview {
        index,
        width: image.width(),
        height: image.height(),
        format: image::guess_format(&bytes).ok(),
        bytes,
        image,
    }))
}
