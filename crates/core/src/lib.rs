#![deny(missing_docs)]
//! Skeindocs core: slugs, front matter, positional edits, and route ids.

/// Positional edit buffer for source rewriting.
pub mod edit;
/// Shared source location type.
pub mod error;
/// YAML front matter extraction helpers.
pub mod frontmatter;
/// Route id parameter extraction.
pub mod route;
/// Slug generation.
pub mod slug;

pub use edit::EditBuffer;
pub use error::SourceLocation;
pub use frontmatter::{Frontmatter, FrontmatterError, extract_frontmatter};
pub use route::route_params;
pub use slug::slugify;
