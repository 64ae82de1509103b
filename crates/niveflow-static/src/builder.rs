//! Native static site builder.
//!
//! Renders every markdown page of a staged docs directory into HTML at the
//! same relative path, copies everything else verbatim and writes a search
//! index next to the pages.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use rayon::prelude::*;
use walkdir::WalkDir;

use niveflow_mdx::{parse_body, parse_markdown, ParsedDoc};
use niveflow_sync::fsutil::{empty_dir, is_ignored_name};

use crate::assets::AssetPipeline;
use crate::error::{io_err, BuildError};
use crate::meta::SiteMeta;
use crate::nav::{build_nav_tree, NavKind, NavNode};
use crate::templates::{Context, NavLink, TemplateEngine, TocLink};

/// File name of the generated search index.
pub const SEARCH_INDEX_FILE: &str = "search-index.json";

const SEARCH_TEXT_LIMIT: usize = 2000;

/// Configuration for one native build.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Staged docs directory
    pub docs_dir: PathBuf,

    /// Output directory; emptied before the build
    pub output_dir: PathBuf,

    /// URL prefix every generated link starts with
    pub base_url: String,

    pub meta: SiteMeta,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("public/docs"),
            output_dir: PathBuf::from("dist"),
            base_url: "/".to_string(),
            meta: SiteMeta::default(),
        }
    }
}

/// Result of a native build.
#[derive(Debug)]
pub struct SiteResult {
    /// Number of pages rendered
    pub pages: usize,

    /// Number of non-markdown files copied
    pub assets: usize,

    pub duration_ms: u64,

    pub output_dir: PathBuf,
}

#[derive(Debug)]
struct PageInfo {
    relative_path: PathBuf,
    output_path: PathBuf,
    href: String,
    title: String,
    doc: ParsedDoc,
}

pub struct SiteBuilder {
    config: SiteConfig,
    templates: TemplateEngine,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Result<Self, BuildError> {
        Ok(Self {
            config,
            templates: TemplateEngine::new()?,
        })
    }

    /// Build the site. Blocking; run it off the async runtime.
    pub fn build(&self) -> Result<SiteResult, BuildError> {
        let start = Instant::now();
        let docs_dir = &self.config.docs_dir;

        if !docs_dir.is_dir() {
            return Err(io_err(
                docs_dir,
                io::Error::new(io::ErrorKind::NotFound, "docs directory not found"),
            ));
        }

        empty_dir(&self.config.output_dir)?;

        let (pages, files) = self.discover()?;
        let nav = build_nav_tree(docs_dir)?
            .iter()
            .map(|node| self.nav_link(node))
            .collect::<Vec<_>>();

        pages
            .par_iter()
            .map(|page| self.render_page(page, &nav))
            .collect::<Result<Vec<_>, _>>()?;

        self.write_landing_page(&pages, &nav)?;

        for relative in &files {
            let source = docs_dir.join(relative);
            let target = self.config.output_dir.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::copy(&source, &target).map_err(|e| io_err(&source, e))?;
        }

        AssetPipeline::write_all(&self.config.output_dir)?;
        self.write_search_index(&pages)?;

        tracing::debug!(
            "Rendered {} pages and copied {} files into {}",
            pages.len(),
            files.len(),
            self.config.output_dir.display()
        );

        Ok(SiteResult {
            pages: pages.len(),
            assets: files.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Split the docs directory into parsed pages and plain files.
    fn discover(&self) -> Result<(Vec<PageInfo>, Vec<PathBuf>), BuildError> {
        let docs_dir = &self.config.docs_dir;
        let mut pages = Vec::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(docs_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_name(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry.map_err(niveflow_sync::SyncError::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(docs_dir).unwrap_or(path).to_path_buf();

            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                files.push(relative);
                continue;
            }

            let source = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            let doc = parse_markdown(&source).unwrap_or_else(|e| {
                tracing::warn!("Ignoring front matter of {}: {}", path.display(), e);
                parse_body(&source)
            });

            let output_relative = relative.with_extension("html");
            let title = doc.title().unwrap_or_else(|| {
                relative
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

            pages.push(PageInfo {
                href: self.href(&output_relative),
                output_path: self.config.output_dir.join(&output_relative),
                relative_path: relative,
                title,
                doc,
            });
        }

        Ok((pages, files))
    }

    fn href(&self, relative: &Path) -> String {
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", self.config.base_url, path)
    }

    fn nav_link(&self, node: &NavNode) -> NavLink {
        let href = match node.kind {
            NavKind::Directory => String::new(),
            NavKind::File => self.href(&Path::new(&node.path).with_extension("html")),
        };
        NavLink {
            title: node.display_title(),
            href,
            children: node.children.iter().map(|c| self.nav_link(c)).collect(),
            active: false,
        }
    }

    fn render_page(&self, page: &PageInfo, nav: &[NavLink]) -> Result<(), BuildError> {
        let html = self.render_html(page, nav)?;

        if let Some(parent) = page.output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::write(&page.output_path, html).map_err(|e| io_err(&page.output_path, e))
    }

    fn render_html(&self, page: &PageInfo, nav: &[NavLink]) -> Result<String, BuildError> {
        let meta = &self.config.meta;
        let context = Context {
            title: page.title.clone(),
            site_title: meta.title.clone(),
            logo: meta.logo.clone(),
            avatar: meta.avatar.clone(),
            content: render_markdown(&page.doc),
            nav: mark_active(nav, &page.href),
            toc: page
                .doc
                .toc
                .iter()
                .map(|e| TocLink {
                    title: e.title.clone(),
                    id: e.id.clone(),
                    level: e.level,
                })
                .collect(),
            base_url: self.config.base_url.clone(),
        };

        self.templates.render_page("doc.html", &context)
    }

    /// Render the configured index page a second time as `index.html`.
    fn write_landing_page(&self, pages: &[PageInfo], nav: &[NavLink]) -> Result<(), BuildError> {
        let index_path = Path::new(&self.config.meta.index_path);
        let Some(page) = pages.iter().find(|p| p.relative_path == index_path) else {
            tracing::warn!(
                "Index page {} not found in {}",
                self.config.meta.index_path,
                self.config.docs_dir.display()
            );
            return Ok(());
        };

        let landing = self.config.output_dir.join("index.html");
        if landing == page.output_path {
            return Ok(());
        }

        let html = self.render_html(page, nav)?;
        fs::write(&landing, html).map_err(|e| io_err(&landing, e))
    }

    fn write_search_index(&self, pages: &[PageInfo]) -> Result<(), BuildError> {
        let index: Vec<serde_json::Value> = pages
            .iter()
            .map(|page| {
                let description = page
                    .doc
                    .frontmatter
                    .as_ref()
                    .and_then(|f| f.description.clone())
                    .unwrap_or_default();

                serde_json::json!({
                    "title": page.title,
                    "description": description,
                    "url": page.href,
                    "content": plain_text(&page.doc.content),
                })
            })
            .collect();

        let path = self.config.output_dir.join(SEARCH_INDEX_FILE);
        let json = serde_json::to_string_pretty(&index)?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Render the body of `doc`, giving headings the ids listed in its TOC and
/// pointing relative `.md` links at the generated `.html` pages.
fn render_markdown(doc: &ParsedDoc) -> String {
    let mut headings = doc.toc.iter();

    let events = Parser::new_ext(&doc.content, markdown_options()).map(|event| match event {
        Event::Start(Tag::Heading {
            level,
            id: None,
            classes,
            attrs,
        }) => Event::Start(Tag::Heading {
            level,
            id: headings.next().map(|e| CowStr::from(e.id.clone())),
            classes,
            attrs,
        }),
        Event::Start(Tag::Heading { .. }) => {
            headings.next();
            event
        }
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: rewrite_link(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut output = String::new();
    html::push_html(&mut output, events);
    output
}

fn rewrite_link(url: CowStr<'_>) -> CowStr<'_> {
    if url.contains("://") || url.starts_with("mailto:") || url.starts_with('#') {
        return url;
    }

    let (path, fragment) = url.split_at(url.find('#').unwrap_or(url.len()));
    let rewritten = path
        .strip_suffix(".md")
        .map(|stem| format!("{}.html{}", stem, fragment));

    match rewritten {
        Some(rewritten) => CowStr::from(rewritten),
        None => url,
    }
}

fn mark_active(nav: &[NavLink], href: &str) -> Vec<NavLink> {
    nav.iter()
        .map(|link| NavLink {
            active: !link.href.is_empty() && link.href == href,
            children: mark_active(&link.children, href),
            ..link.clone()
        })
        .collect()
}

/// Text content of a markdown body for the search index.
fn plain_text(content: &str) -> String {
    let mut text = String::new();
    for event in Parser::new_ext(content, markdown_options()) {
        if let Event::Text(t) | Event::Code(t) = event {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(t.trim());
        }
    }
    text.chars().take(SEARCH_TEXT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn build(docs: &Path, out: &Path) -> SiteResult {
        SiteBuilder::new(SiteConfig {
            docs_dir: docs.to_path_buf(),
            output_dir: out.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
        .build()
        .unwrap()
    }

    #[test]
    fn renders_pages_at_same_relative_path() {
        let temp = tempdir().unwrap();
        let docs = temp.path().join("docs");
        let out = temp.path().join("dist");
        fs::create_dir_all(docs.join("guide")).unwrap();
        fs::write(docs.join("README.md"), "# Welcome\n\nSee [install](guide/install.md#steps).").unwrap();
        fs::write(docs.join("guide/install.md"), "---\ntitle: Install\n---\n## Steps\n").unwrap();
        fs::write(docs.join("guide/diagram.png"), "png").unwrap();

        let result = build(&docs, &out);

        assert_eq!(result.pages, 2);
        assert_eq!(result.assets, 1);
        assert!(out.join("README.html").exists());
        assert!(out.join("guide/diagram.png").exists());
        assert!(out.join("assets/main.css").exists());

        let install = fs::read_to_string(out.join("guide/install.html")).unwrap();
        assert!(install.contains("<title>Install - NiveFlow Docs</title>"));
        assert!(install.contains(r#"<h2 id="steps">Steps</h2>"#));

        let landing = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(landing.contains(r#"href="guide/install.html#steps""#));
    }

    #[test]
    fn clears_output_before_building() {
        let temp = tempdir().unwrap();
        let docs = temp.path().join("docs");
        let out = temp.path().join("dist");
        fs::create_dir_all(&docs).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.html"), "old").unwrap();
        fs::write(docs.join("README.md"), "# Home").unwrap();

        build(&docs, &out);

        assert!(!out.join("stale.html").exists());
    }

    #[test]
    fn generates_search_index() {
        let temp = tempdir().unwrap();
        let docs = temp.path().join("docs");
        let out = temp.path().join("dist");
        fs::create_dir_all(&docs).unwrap();
        fs::write(
            docs.join("README.md"),
            "---\ntitle: Test\ndescription: About things\n---\n# Searchable *Content*",
        )
        .unwrap();

        build(&docs, &out);

        let index: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(SEARCH_INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(index[0]["title"], "Test");
        assert_eq!(index[0]["description"], "About things");
        assert_eq!(index[0]["url"], "/README.html");
        assert_eq!(index[0]["content"], "Searchable Content");
    }

    #[test]
    fn broken_front_matter_falls_back_to_body() {
        let temp = tempdir().unwrap();
        let docs = temp.path().join("docs");
        let out = temp.path().join("dist");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("README.md"), "# Home").unwrap();
        fs::write(docs.join("changelog.md"), "---\n\n# Changelog\n\nFirst release.").unwrap();

        let result = build(&docs, &out);

        assert_eq!(result.pages, 2);
        let page = fs::read_to_string(out.join("changelog.html")).unwrap();
        assert!(page.contains("<hr />"));
        assert!(page.contains(r#"<h1 id="changelog">Changelog</h1>"#));
    }

    #[test]
    fn missing_docs_dir_is_an_error() {
        let temp = tempdir().unwrap();
        let builder = SiteBuilder::new(SiteConfig {
            docs_dir: temp.path().join("nope"),
            output_dir: temp.path().join("dist"),
            ..Default::default()
        })
        .unwrap();

        assert!(matches!(builder.build(), Err(BuildError::Io { .. })));
    }

    #[test]
    fn rewrites_only_relative_markdown_links() {
        assert_eq!(&*rewrite_link("a/b.md".into()), "a/b.html");
        assert_eq!(&*rewrite_link("b.md#x".into()), "b.html#x");
        assert_eq!(&*rewrite_link("https://x.dev/b.md".into()), "https://x.dev/b.md");
        assert_eq!(&*rewrite_link("#top".into()), "#top");
        assert_eq!(&*rewrite_link("img.png".into()), "img.png");
    }
}
