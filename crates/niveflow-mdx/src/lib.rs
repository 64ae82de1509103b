//! Markdown document parsing for niveflow.
//!
//! Extracts optional YAML front matter, builds a table of contents from the
//! headings, and derives a display title for navigation.

pub mod frontmatter;
pub mod parser;

pub use frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};
pub use parser::{parse_body, parse_markdown, slugify, ParseError, ParsedDoc, TocEntry};
