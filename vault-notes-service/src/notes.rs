//! Note lookup and markdown rendering.
//!
//! Notes are resolved in two steps: the metadata index maps a slug to an
//! object storage key, and the object store returns the markdown source.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use vault_notes_types::NoteMeta;

use crate::error::{AppError, Result};

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-_/]+$").expect("valid slug regex"));

/// Leading YAML frontmatter block
static FRONTMATTER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A---(?s:.*?)---\s*").expect("valid frontmatter regex"));

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// Read access to the `NOTE:{slug}` metadata index.
#[async_trait]
pub trait NoteIndex: Send + Sync {
    async fn lookup(&self, slug: &str) -> Result<Option<NoteMeta>>;

    async fn all_notes(&self) -> Result<Vec<NoteMeta>>;
}

/// Read access to the markdown sources.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_text(&self, key: &str) -> Result<Option<String>>;
}

/// Object storage backed by a local directory (the vault).
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are relative paths inside the vault; anything that could
    /// escape the root resolves to nothing.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get_text(&self, key: &str) -> Result<Option<String>> {
        let Some(path) = self.resolve(key) else {
            log::warn!("[VAULT] Rejected object key '{}'", key);
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

pub fn strip_frontmatter(markdown: &str) -> &str {
    match FRONTMATTER_PATTERN.find(markdown) {
        Some(m) => &markdown[m.end()..],
        None => markdown,
    }
}

pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(strip_frontmatter(markdown), options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// A note ready for the page shell.
#[derive(Debug)]
pub struct RenderedNote {
    pub meta: NoteMeta,
    pub body_html: String,
}

impl RenderedNote {
    pub fn title(&self) -> &str {
        self.meta.title.as_deref().unwrap_or(&self.meta.slug)
    }
}

/// Look up `slug` in the index, fetch its source and render it.
pub async fn load_note(
    index: &dyn NoteIndex,
    objects: &dyn ObjectStore,
    slug: &str,
) -> Result<RenderedNote> {
    let meta = index.lookup(slug).await?.ok_or(AppError::NotFound("Not found"))?;
    let source = objects
        .get_text(&meta.key)
        .await?
        .ok_or(AppError::NotFound("Missing object"))?;
    Ok(RenderedNote {
        body_html: render_markdown(&source),
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvStore;

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("alpha"));
        assert!(is_valid_slug("research/Quantum_Notes-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("bad slug"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("a?b"));
    }

    #[test]
    fn test_strip_frontmatter() {
        let md = "---\ntitle: Alpha\narm: public\n---\n\n# Heading\nBody";
        assert_eq!(strip_frontmatter(md), "# Heading\nBody");
        assert_eq!(strip_frontmatter("# No frontmatter"), "# No frontmatter");
        // Only a leading block counts
        assert_eq!(strip_frontmatter("text\n---\nx\n---\n"), "text\n---\nx\n---\n");
    }

    #[test]
    fn test_render_markdown() {
        let html = render_markdown("---\ntitle: T\n---\n# Hello\n\nSome *text*.");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<em>text</em>"));
        assert!(!html.contains("title: T"));
    }

    #[tokio::test]
    async fn test_fs_object_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/Note.md"), "# Note").unwrap();
        let store = FsObjectStore::new(dir.path());

        assert_eq!(
            store.get_text("public/Note.md").await.unwrap().as_deref(),
            Some("# Note")
        );
        assert_eq!(store.get_text("public/Missing.md").await.unwrap(), None);
        assert_eq!(store.get_text("../outside.md").await.unwrap(), None);
        assert_eq!(store.get_text("/etc/passwd").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_note_not_found_cases() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let kv = KvStore::open(":memory:").unwrap();
        kv.put_note(&NoteMeta {
            key: "public/Gone.md".to_string(),
            slug: "gone".to_string(),
            title: None,
            tags: vec![],
        })
        .unwrap();

        assert!(matches!(
            load_note(&kv, &store, "unknown").await,
            Err(AppError::NotFound("Not found"))
        ));
        assert!(matches!(
            load_note(&kv, &store, "gone").await,
            Err(AppError::NotFound("Missing object"))
        ));
    }

    #[tokio::test]
    async fn test_load_note_title_falls_back_to_slug() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Plain.md"), "plain body").unwrap();
        let store = FsObjectStore::new(dir.path());
        let kv = KvStore::open(":memory:").unwrap();
        kv.put_note(&NoteMeta {
            key: "Plain.md".to_string(),
            slug: "plain".to_string(),
            title: None,
            tags: vec![],
        })
        .unwrap();

        let note = load_note(&kv, &store, "plain").await.unwrap();
        assert_eq!(note.title(), "plain");
        assert!(note.body_html.contains("plain body"));
    }
}
