//! # Photo Feed
//!
//! A local photo feed. Pick a photo, write a caption with hashtags, save it;
//! the feed shows every saved post as a grid with its tags. Everything stays
//! on the device: a SQLite file for posts and tags, a directory of image
//! payloads beside it.
//!
//! # Flow
//!
//! ```text
//! picker ──▶ import ──▶ composer ──save──▶ store ──subscribe──▶ render
//!            (decode)   (caption)         (rows + blobs)      (grid)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tagging`] | Hashtag extraction and stripping for captions |
//! | [`import`] | Concurrent load + decode of picked items, with an explicit failure policy |
//! | [`composer`] | Compose-form state: selection, previews, caption, the save trigger |
//! | [`store`] | SQLite post/tag store with cascading delete and feed subscriptions |
//! | [`blob`] | Content-addressed image payload storage |
//! | [`render`] | Terminal grid and static HTML rendering of the feed |
//! | [`config`] | `config.toml` loading, validation, and stock defaults |
//! | [`types`] | `Post`, `Tag` and their ids |
//!
//! # Design Decisions
//!
//! ## Tags Are Occurrences, Not a Vocabulary
//!
//! Each hashtag in a caption becomes its own tag row owned by the post. Two
//! posts tagged `#sunset` have two rows; a caption with `#a #a` has two rows.
//! There is no tag table to keep consistent and deleting a post is a single
//! cascading delete.
//!
//! ## Images Out of Line
//!
//! Post rows carry only a SHA-256 digest and length. The bytes live in the
//! [`blob`] directory, so reading the feed never touches image payloads and
//! identical photos are stored once.
//!
//! ## Snapshots, Not Live Objects
//!
//! The feed is observed through [`store::PostStore::subscribe`], which yields
//! a full ordered snapshot after every write. Views re-render from the
//! snapshot; nothing holds a live handle into the database.
//!
//! ## One Error Line
//!
//! Import failures of any kind (transfer, decode) show the same message;
//! the cause goes to the log. Store failures are not swallowed: they come
//! back as [`store::StoreError`] and the composer shows them too.

pub mod blob;
pub mod composer;
pub mod config;
pub mod import;
pub mod render;
pub mod store;
pub mod tagging;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
