//! Feed rendering: terminal grid and static HTML.
//!
//! # Cell Contract
//!
//! Every post renders as the same three-part cell in both outputs:
//!
//! 1. **Header**: positional index + cleaned caption
//! 2. **Image line**: payload size and short digest, or `no image`
//! 3. **Tags**: each label prefixed with `#`, in caption order
//!
//! ```text
//! 001 Sunset                 002 (no caption)
//!     image 18.2 KB 3fa1c9ab     no image
//!     #vibes #ocean              #only
//!
//! 003 no tags here
//!     image 4.0 KB b04d1799
//!
//! 3 posts, 3 tags
//! ```
//!
//! # Architecture
//!
//! `format_*` functions return `Vec<String>` and `render_*` functions
//! return maud `Markup`; both are pure. `print_*` and `export_*` wrappers
//! do the I/O.

use crate::blob::ImageRef;
use crate::store::{PostStore, StoreError};
use crate::types::Post;
use maud::{DOCTYPE, Markup, html};
use std::fs;
use std::path::Path;

/// Widest a text cell may get before captions are truncated.
const MAX_CELL_WIDTH: usize = 36;

const FEED_CSS: &str = "\
body { font-family: system-ui, sans-serif; margin: 2rem; background: #fafafa; color: #111; }
.feed { display: grid; gap: 10px; }
.post { background: #fff; border: 1px solid #e0e0e0; border-radius: 10px; padding: 10px; }
.post img { width: 100%; aspect-ratio: 1; object-fit: contain; border-radius: 10px; }
.caption { margin: 0.5rem 0; }
.tag { color: #1a5fd0; margin-right: 0.4rem; }
.empty { color: #666; }
";

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}

/// Human-readable byte size.
fn format_size(len: u64) -> String {
    if len < 1024 {
        format!("{} B", len)
    } else if len < 1024 * 1024 {
        format!("{:.1} KB", len as f64 / 1024.0)
    } else {
        format!("{:.1} MB", len as f64 / (1024.0 * 1024.0))
    }
}

/// `#label` for every tag, space separated.
pub fn format_tags(post: &Post) -> String {
    post.tags
        .iter()
        .map(|t| format!("#{}", t.label))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Caption shown for a post; posts saved with only hashtags have none.
fn display_caption(post: &Post) -> &str {
    if post.caption.is_empty() {
        "(no caption)"
    } else {
        &post.caption
    }
}

// ============================================================================
// Terminal output
// ============================================================================

/// Lines of one post cell. Captions keep only their first line.
pub fn format_post_cell(index: usize, post: &Post) -> Vec<String> {
    let caption = display_caption(post).lines().next().unwrap_or_default();
    let mut lines = vec![format!(
        "{} {}",
        format_index(index),
        truncate(caption, MAX_CELL_WIDTH)
    )];
    match &post.image {
        Some(image) => lines.push(format!(
            "    image {} {}",
            format_size(image.len),
            image.digest.chars().take(8).collect::<String>()
        )),
        None => lines.push("    no image".to_string()),
    }
    if !post.tags.is_empty() {
        lines.push(format!("    {}", format_tags(post)));
    }
    lines
}

/// Lay the feed out as a grid of `columns` cells per row.
pub fn format_feed(posts: &[Post], columns: usize) -> Vec<String> {
    if posts.is_empty() {
        return vec!["No posts yet".to_string()];
    }
    let columns = columns.max(1);
    let cells: Vec<Vec<String>> = posts
        .iter()
        .enumerate()
        .map(|(i, post)| format_post_cell(i + 1, post))
        .collect();
    let width = cells
        .iter()
        .flatten()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    for (row_index, row) in cells.chunks(columns).enumerate() {
        if row_index > 0 {
            lines.push(String::new());
        }
        let height = row.iter().map(Vec::len).max().unwrap_or(0);
        for i in 0..height {
            let mut line = String::new();
            for (col, cell) in row.iter().enumerate() {
                let text = cell.get(i).map(String::as_str).unwrap_or("");
                if col + 1 < row.len() {
                    let pad = width - text.chars().count();
                    line.push_str(text);
                    line.push_str(&" ".repeat(pad + 4));
                } else {
                    line.push_str(text);
                }
            }
            lines.push(line.trim_end().to_string());
        }
    }

    let tag_count: usize = posts.iter().map(|p| p.tags.len()).sum();
    lines.push(String::new());
    lines.push(format!(
        "{} {}, {} {}",
        posts.len(),
        if posts.len() == 1 { "post" } else { "posts" },
        tag_count,
        if tag_count == 1 { "tag" } else { "tags" }
    ));
    lines
}

/// Confirmation shown after a save.
pub fn format_saved_post(post: &Post) -> Vec<String> {
    let mut lines = vec![format!("Saved post {}", post.id)];
    lines.push(format!("    Caption: {}", display_caption(post)));
    match &post.image {
        Some(image) => lines.push(format!(
            "    Image: {} ({})",
            format_size(image.len),
            image.digest
        )),
        None => lines.push("    Image: none".to_string()),
    }
    if !post.tags.is_empty() {
        lines.push(format!("    Tags: {}", format_tags(post)));
    }
    lines
}

/// Print the feed grid to stdout.
pub fn print_feed(posts: &[Post], columns: usize) {
    for line in format_feed(posts, columns) {
        println!("{}", line);
    }
}

/// Print a save confirmation to stdout.
pub fn print_saved_post(post: &Post) {
    for line in format_saved_post(post) {
        println!("{}", line);
    }
}

// ============================================================================
// HTML output
// ============================================================================

fn base_document(title: &str, css: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (css) }
            }
            body {
                (content)
            }
        }
    }
}

fn render_post(post: &Post, image_href: &dyn Fn(&ImageRef) -> String) -> Markup {
    html! {
        article.post id={ "post-" (post.id.0) } {
            @if let Some(image) = &post.image {
                img src=(image_href(image)) alt=(post.caption);
            }
            p.caption { (post.caption) }
            @for tag in &post.tags {
                span.tag { "#" (tag.label) }
            }
        }
    }
}

/// Render the whole feed as an HTML page with a `columns`-wide grid.
///
/// `image_href` maps a post's image to the URL the page should load it from.
pub fn render_feed_html(
    posts: &[Post],
    columns: usize,
    image_href: &dyn Fn(&ImageRef) -> String,
) -> Markup {
    let grid_style = format!("grid-template-columns: repeat({}, 1fr);", columns.max(1));
    let content = html! {
        @if posts.is_empty() {
            p.empty { "No posts yet" }
        } @else {
            main.feed style=(grid_style) {
                @for post in posts {
                    (render_post(post, image_href))
                }
            }
        }
    };
    base_document("Photo Feed", FEED_CSS, content)
}

/// Result of an HTML export.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub posts: usize,
    pub images: usize,
}

/// File name an exported image is written under: digest plus sniffed extension.
fn image_file_name(image: &ImageRef, bytes: &[u8]) -> String {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");
    format!("{}.{}", image.digest, ext)
}

/// Write `index.html` and an `images/` directory for the current feed.
pub fn export_feed_html(
    store: &PostStore,
    out_dir: &Path,
    columns: usize,
) -> Result<ExportSummary, StoreError> {
    let posts = store.all_posts()?;
    let images_dir = out_dir.join("images");
    fs::create_dir_all(&images_dir)?;

    let mut names = std::collections::HashMap::new();
    for post in &posts {
        let Some(image) = &post.image else { continue };
        if names.contains_key(&image.digest) {
            continue;
        }
        let bytes = store.blobs().get(image)?;
        let name = image_file_name(image, &bytes);
        fs::write(images_dir.join(&name), &bytes)?;
        names.insert(image.digest.clone(), name);
    }

    let href = |image: &ImageRef| {
        names
            .get(&image.digest)
            .map(|name| format!("images/{}", name))
            .unwrap_or_default()
    };
    let page = render_feed_html(&posts, columns, &href);
    fs::write(out_dir.join("index.html"), page.into_string())?;

    tracing::info!(posts = posts.len(), images = names.len(), out = %out_dir.display(), "exported feed");
    Ok(ExportSummary {
        posts: posts.len(),
        images: names.len(),
    })
}

// ============================================================================
// Tests
// ============================================================================
