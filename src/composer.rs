//! Compose-form state and its two triggers.
//!
//! The composer is everything the single screen holds between user
//! actions: the current previews, the caption being typed, the payload that
//! will be saved, and the error line. It owns no storage; the store is
//! passed to [`Composer::save`].
//!
//! - **Selection changed** ([`Composer::select`]): clears previews and the
//!   error, runs the import, keeps the raw bytes of the newest preview.
//! - **Save** ([`Composer::save`]): persists the caption and those bytes.
//!
//! Saving does not reset the form; it keeps its state until the user
//! changes it.

use crate::import::{ImportFailure, Importer, PickedItem, Preview};
use crate::store::{PostStore, StoreError};
use crate::types::Post;

/// What a selection change produced.
#[derive(Debug, Default)]
pub struct SelectionReport {
    pub loaded: usize,
    pub skipped: usize,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Default)]
pub struct Composer {
    importer: Importer,
    previews: Vec<Preview>,
    caption: String,
    image_bytes: Option<Vec<u8>>,
    error_message: Option<String>,
}

impl Composer {
    pub fn new(importer: Importer) -> Self {
        Self {
            importer,
            ..Self::default()
        }
    }

    /// Replace the selection and load it.
    ///
    /// Prior previews and any prior error are cleared first. The imported
    /// bytes are replaced only when the new selection yields an image, so a
    /// failed re-pick still saves the last photo that did load.
    pub async fn select(&mut self, items: Vec<Box<dyn PickedItem>>) -> SelectionReport {
        self.previews.clear();
        self.error_message = None;

        let outcome = self.importer.import(items).await;
        if let Some(message) = outcome.error_message() {
            self.error_message = Some(message.to_string());
        }
        if let Some(bytes) = outcome.image_bytes() {
            self.image_bytes = Some(bytes.to_vec());
        }

        let report = SelectionReport {
            loaded: outcome.previews.len(),
            skipped: outcome.skipped,
            failures: outcome.failures,
        };
        self.previews = outcome.previews;
        report
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.caption = caption.into();
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn previews(&self) -> &[Preview] {
        &self.previews
    }

    /// Payload the next save will attach.
    pub fn image_bytes(&self) -> Option<&[u8]> {
        self.image_bytes.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Save the current caption and image as a new post.
    ///
    /// A store failure is shown on the error line and returned.
    pub fn save(&mut self, store: &PostStore) -> Result<Post, StoreError> {
        match store.save(&self.caption, self.image_bytes.as_deref()) {
            Ok(post) => Ok(post),
            Err(e) => {
                tracing::error!(error = %e, "saving post failed");
                self.error_message = Some(format!("Could not save post: {e}"));
                Err(e)
            }
        }
    }
}
