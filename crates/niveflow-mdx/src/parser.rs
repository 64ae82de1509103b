//! Markdown document parser.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A parsed markdown document.
#[derive(Debug, Clone)]
pub struct ParsedDoc {
    /// Parsed front matter (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Markdown content (without front matter)
    pub content: String,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,
}

impl ParsedDoc {
    /// Display title: the front matter title, else the first level-1 heading.
    pub fn title(&self) -> Option<String> {
        self.frontmatter
            .as_ref()
            .and_then(|f| f.title.clone())
            .or_else(|| {
                self.toc
                    .iter()
                    .find(|entry| entry.level == 1)
                    .map(|entry| entry.title.clone())
            })
    }

    /// Whether the page wants to appear in navigation.
    pub fn in_nav(&self) -> bool {
        self.frontmatter.as_ref().map(|f| f.nav).unwrap_or(true)
    }
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing markdown.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Front matter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Parse a markdown document.
///
/// Extracts front matter and generates a table of contents from headings.
pub fn parse_markdown(source: &str) -> Result<ParsedDoc, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;
    let mut doc = parse_body(content);
    doc.frontmatter = frontmatter;
    Ok(doc)
}

/// Parse `content` as plain markdown, without looking for front matter.
pub fn parse_body(content: &str) -> ParsedDoc {
    let mut toc = Vec::new();
    let mut current_heading: Option<(u8, String)> = None;

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    for event in Parser::new_ext(content, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((level as u8, String::new()));
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut heading_text)) = current_heading {
                    heading_text.push_str(&text);
                }
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = current_heading.take() {
                    let title = title.trim().to_string();
                    let id = slugify(&title);
                    toc.push(TocEntry { title, id, level });
                }
            }

            _ => {}
        }
    }

    ParsedDoc {
        frontmatter: None,
        content: content.to_string(),
        toc,
    }
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
