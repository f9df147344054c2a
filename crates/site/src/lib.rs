#![deny(missing_docs)]
//! Skeindocs site engine: manifest listings, checked snippet rendering,
//! and docs page reading.

/// Rendered-snippet cache keyed by content digest.
pub mod cache;
/// Build error type.
pub mod error;
mod highlight;
/// Type-name anchor linking.
pub mod linker;
/// Module manifest parsing and listing generation.
pub mod manifest;
/// Markdown page rendering.
pub mod markdown;
/// Docs directory reading.
pub mod reader;
/// The fenced code-block pipeline.
pub mod renderer;
mod script;
/// JS to TS snippet synthesis.
pub mod synthesize;

pub use cache::SnippetCache;
pub use error::DocsError;
pub use linker::{LinkScope, TypeLinks};
pub use manifest::{ListingKind, Module, TypeDecl, load_modules, render_modules};
pub use markdown::{Section, Subsection};
pub use reader::{DocsContext, Document, read_all, read_file};
pub use renderer::{RenderContext, render_code_block};
pub use synthesize::generate_ts_from_js;
