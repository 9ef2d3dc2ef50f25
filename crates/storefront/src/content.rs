//! Blog content loaded from markdown files.
//!
//! Posts live in `{content_dir}/blog/*.md` with YAML front matter. Files
//! may carry a `YYYY-MM-DD-` prefix for ordering on disk; it is not part of
//! the slug. Everything is parsed and rendered once at startup.

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Words read per minute when estimating reading time.
const WORDS_PER_MINUTE: usize = 200;

/// Length of the plain-text excerpt shown in listings.
const EXCERPT_CHARS: usize = 180;

/// Front matter of a blog post.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub published_at: NaiveDate,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

/// A rendered blog post.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub slug: String,
    #[serde(flatten)]
    pub meta: PostMeta,
    pub excerpt: String,
    pub reading_time_minutes: u32,
    pub content_html: String,
}

/// Listing entry for a post (no body).
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary<'a> {
    pub slug: &'a str,
    #[serde(flatten)]
    pub meta: &'a PostMeta,
    pub excerpt: &'a str,
    pub reading_time_minutes: u32,
}

impl Post {
    #[must_use]
    pub fn summary(&self) -> PostSummary<'_> {
        PostSummary {
            slug: &self.slug,
            meta: &self.meta,
            excerpt: &self.excerpt,
            reading_time_minutes: self.reading_time_minutes,
        }
    }
}

/// In-memory blog, newest post first.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    posts: Arc<Vec<Post>>,
}

impl ContentStore {
    /// Load all posts from `{content_dir}/blog`.
    ///
    /// A missing directory yields an empty blog. Individual files that fail
    /// to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the blog directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("blog");
        let mut posts = Vec::new();

        if !dir.exists() {
            tracing::info!("Blog directory does not exist yet: {:?}", dir);
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match Self::load_post(&path) {
                    Ok(post) => {
                        tracing::info!("Loaded post: {}", post.slug);
                        posts.push(post);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load post {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::from_posts(posts))
    }

    /// Build a store from already-rendered posts.
    #[must_use]
    pub fn from_posts(mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| {
            b.meta
                .published_at
                .cmp(&a.meta.published_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        Self {
            posts: Arc::new(posts),
        }
    }

    fn load_post(path: &Path) -> Result<Post, ContentError> {
        let source =
            std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;
        let filename = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?;
        parse_post(filename, &source)
    }

    /// A published post by slug. Drafts are not returned.
    #[must_use]
    pub fn get_post(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug && !p.meta.draft)
    }

    /// Published posts, newest first.
    pub fn published_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter().filter(|p| !p.meta.draft)
    }

    /// Published posts with `tag` (case-insensitive), newest first.
    pub fn posts_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Post> {
        self.published_posts()
            .filter(move |p| p.meta.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// Unique tags across published posts, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .published_posts()
            .flat_map(|p| p.meta.tags.iter().map(|t| t.to_lowercase()))
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

/// Parse one markdown file; `filename` is the file stem.
///
/// # Errors
///
/// Returns `ContentError::Parse` for missing or invalid front matter.
pub fn parse_post(filename: &str, source: &str) -> Result<Post, ContentError> {
    let slug = DATE_PREFIX_RE
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map_or(filename, |m| m.as_str())
        .to_string();

    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PostMeta> = matter
        .parse(source)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    let content_html = render_markdown(&parsed.content);
    let word_count = parsed.content.split_whitespace().count();
    let reading_time_minutes =
        u32::try_from(word_count.div_ceil(WORDS_PER_MINUTE)).unwrap_or(u32::MAX);

    Ok(Post {
        excerpt: meta
            .description
            .clone()
            .unwrap_or_else(|| excerpt(&content_html)),
        slug,
        meta,
        content_html,
        reading_time_minutes: reading_time_minutes.max(1),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown support.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.superscript = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    // Posts are authored in the repository, raw HTML is trusted
    options.render.r#unsafe = true;

    markdown_to_html(content, &options)
}

/// Matches `YYYY-MM-DD-rest` file stems.
static DATE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}-(.+)$").expect("date prefix regex is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Plain-text opening of rendered HTML, cut at a word boundary.
fn excerpt(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = WHITESPACE_RE.replace_all(text.trim(), " ");
    if text.chars().count() <= EXCERPT_CHARS {
        return text.into_owned();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    let cut = cut.rsplit_once(' ').map_or(cut.as_str(), |(head, _)| head);
    format!("{}…", cut.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const POST: &str = "---\ntitle: Why Ragi\npublished_at: 2026-03-02\ntags: [Nutrition, ragi]\n---\n\n# Calcium\n\nFinger millet has **more calcium** than milk.\n";

    #[test]
    fn test_date_prefix_stripped_from_slug() {
        let post = parse_post("2026-03-02-why-ragi", POST).unwrap();
        assert_eq!(post.slug, "why-ragi");
        let post = parse_post("why-ragi", POST).unwrap();
        assert_eq!(post.slug, "why-ragi");
    }

    #[test]
    fn test_markdown_rendered_and_excerpted() {
        let post = parse_post("why-ragi", POST).unwrap();
        assert!(post.content_html.contains("<strong>more calcium</strong>"));
        assert_eq!(post.excerpt, "Calcium Finger millet has more calcium than milk.");
        assert_eq!(post.reading_time_minutes, 1);
    }

    #[test]
    fn test_missing_front_matter_is_an_error() {
        assert!(parse_post("x", "just text").is_err());
    }

    #[test]
    fn test_long_excerpt_is_cut_at_word() {
        let html = format!("<p>{}</p>", "millet ".repeat(60));
        let text = excerpt(&html);
        assert!(text.ends_with('…'));
        assert!(text.chars().count() <= EXCERPT_CHARS + 1);
        assert!(!text.contains("  "));
    }

    #[test]
    fn test_store_orders_and_hides_drafts() {
        let draft = "---\ntitle: Soon\npublished_at: 2026-05-01\ndraft: true\n---\nDraft.";
        let older = "---\ntitle: Old\npublished_at: 2025-01-01\ntags: [recipes]\n---\nOld.";
        let store = ContentStore::from_posts(vec![
            parse_post("old", older).unwrap(),
            parse_post("soon", draft).unwrap(),
            parse_post("why-ragi", POST).unwrap(),
        ]);

        let slugs: Vec<&str> = store.published_posts().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["why-ragi", "old"]);
        assert!(store.get_post("soon").is_none());
        assert_eq!(store.posts_by_tag("NUTRITION").count(), 1);
        assert_eq!(store.tags(), ["nutrition", "ragi", "recipes"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::load(dir.path()).unwrap();
        assert_eq!(store.published_posts().count(), 0);
    }

    #[test]
    fn test_load_from_disk_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let blog = dir.path().join("blog");
        std::fs::create_dir(&blog).unwrap();
        std::fs::write(blog.join("2026-03-02-why-ragi.md"), POST).unwrap();
        std::fs::write(blog.join("broken.md"), "no front matter").unwrap();
        std::fs::write(blog.join("notes.txt"), POST).unwrap();

        let store = ContentStore::load(dir.path()).unwrap();
        let slugs: Vec<&str> = store.published_posts().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["why-ragi"]);
    }
}
