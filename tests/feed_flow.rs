//! End-to-end flow through the public API: pick files from disk, compose,
//! save, observe the feed, export it, delete and collect garbage.

use image::{ImageFormat, RgbImage};
use photo_feed::blob::BlobStore;
use photo_feed::composer::Composer;
use photo_feed::config::{self, CONFIG_FILENAME};
use photo_feed::import::{FailurePolicy, FileItem, Importer, LOAD_FAILED_MESSAGE, PickedItem};
use photo_feed::render;
use photo_feed::store::PostStore;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 200]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn open_store(data_dir: &Path) -> PostStore {
    let config = config::load_config(data_dir).unwrap();
    let blobs = BlobStore::open(config.storage.blobs_path(data_dir)).unwrap();
    PostStore::open(&config.storage.database_path(data_dir), blobs).unwrap()
}

fn picked(path: PathBuf) -> Vec<Box<dyn PickedItem>> {
    vec![Box::new(FileItem::new(path))]
}

#[tokio::test]
async fn compose_save_and_observe_feed() {
    let tmp = TempDir::new().unwrap();
    let photo = write_png(tmp.path(), "dawn.png", 8, 5);
    let data_dir = tmp.path().join("data");
    let store = open_store(&data_dir);
    let mut feed = store.subscribe();
    assert!(feed.current().is_empty());

    let mut composer = Composer::new(Importer::default());
    let report = composer.select(picked(photo.clone())).await;
    assert_eq!(report.loaded, 1);
    assert_eq!(composer.previews()[0].width, 8);
    assert_eq!(composer.previews()[0].height, 5);

    composer.set_caption("Sunset #vibes #ocean");
    let post = composer.save(&store).unwrap();

    let snapshot = feed.changed().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, post.id);
    assert_eq!(snapshot[0].caption, "Sunset");
    assert_eq!(snapshot[0].labels(), vec!["vibes", "ocean"]);
    assert_eq!(
        store.image_bytes(&post).unwrap(),
        Some(std::fs::read(&photo).unwrap())
    );

    let lines = render::format_feed(&snapshot, 2);
    assert!(lines.iter().any(|l| l.contains("Sunset")));
    assert!(lines.iter().any(|l| l.contains("#vibes #ocean")));
}

#[tokio::test]
async fn feed_survives_reopen_in_save_order() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    {
        let store = open_store(&data_dir);
        store.save("first #a", None).unwrap();
        store.save("second #b #c", None).unwrap();
        store.save("third", None).unwrap();
    }

    let store = open_store(&data_dir);
    let posts = store.all_posts().unwrap();
    let captions: Vec<_> = posts.iter().map(|p| p.caption.as_str()).collect();
    assert_eq!(captions, vec!["first", "second", "third"]);
    assert_eq!(posts[1].labels(), vec!["b", "c"]);
    assert!(posts[2].tags.is_empty());
}

#[tokio::test]
async fn unreadable_file_shows_generic_error() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp.path().join("data"));
    let mut composer = Composer::default();

    composer
        .select(picked(tmp.path().join("does-not-exist.jpg")))
        .await;
    assert_eq!(composer.error_message(), Some(LOAD_FAILED_MESSAGE));
    assert!(composer.image_bytes().is_none());

    // Saving still works; the post simply has no image.
    composer.set_caption("text only #note");
    let post = composer.save(&store).unwrap();
    assert!(post.image.is_none());
    assert_eq!(post.labels(), vec!["note"]);
}

#[tokio::test]
async fn skip_failed_policy_from_config_keeps_good_photos() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(
        data_dir.join(CONFIG_FILENAME),
        "[import]\nmax_selection = 3\nfailure_policy = \"skip-failed\"\n",
    )
    .unwrap();
    let config = config::load_config(&data_dir).unwrap();
    assert_eq!(config.import.failure_policy, FailurePolicy::SkipFailed);

    let good = write_png(tmp.path(), "good.png", 4, 4);
    let broken = tmp.path().join("broken.png");
    std::fs::write(&broken, b"not an image").unwrap();

    let items: Vec<Box<dyn PickedItem>> = vec![
        Box::new(FileItem::new(good)),
        Box::new(FileItem::new(broken)),
    ];
    let outcome = config.import.importer().import(items).await;

    assert_eq!(outcome.previews.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.error_message(), Some(LOAD_FAILED_MESSAGE));
}

#[tokio::test]
async fn export_delete_and_collect_garbage() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let store = open_store(&data_dir);
    let photo = std::fs::read(write_png(tmp.path(), "p.png", 3, 3)).unwrap();

    let kept = store.save("kept #stay", Some(&photo)).unwrap();
    let gone = store.save("gone #bye", Some(&[1, 2, 3])).unwrap();

    let out = tmp.path().join("site");
    let summary = render::export_feed_html(&store, &out, 2).unwrap();
    assert_eq!(summary.posts, 2);
    assert_eq!(summary.images, 2);
    let html = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(html.contains("kept"));
    assert!(html.contains("#bye"));

    assert!(store.delete(gone.id).unwrap());
    assert!(!store.delete(gone.id).unwrap());
    assert_eq!(store.len().unwrap(), 1);
    assert!(store.get(gone.id).unwrap().is_none());

    // Nothing left to collect: the deleted post's payload was unshared.
    assert!(store.collect_garbage().unwrap().is_empty());
    let live = kept.image.unwrap();
    assert!(store.blobs().contains(&live.digest));
}
