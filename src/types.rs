//! Entities shared by the store, the composer and the renderers.
//!
//! These are plain values: the store hands out owned snapshots and never
//! hands out live handles into the database.

use crate::blob::ImageRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned post identifier. Increases with every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

/// Store-assigned tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved photo with its cleaned caption and hashtags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Out-of-line image payload, if the post was saved with a photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Caption with hashtag tokens removed.
    pub caption: String,
    pub created_at: DateTime<Utc>,
    /// Tags in the order their hashtags appeared in the caption.
    pub tags: Vec<Tag>,
}

impl Post {
    /// Tag labels in order, without `#`.
    pub fn labels(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.label.as_str()).collect()
    }
}

/// One hashtag occurrence on one post.
///
/// Two posts tagged `#sunset` get two independent `Tag` rows; labels are
/// not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Hashtag text without the leading `#`.
    pub label: String,
    /// Owning post. Deleting that post deletes this tag.
    pub post_id: PostId,
}
