//! Static module/type manifest consumed by the docs build.
//!
//! The manifest is generated from the framework's public surface and
//! handed to the pipeline as JSON. It drives two things: the
//! `**TYPES**` / `**EXPORTS**` macro listings and the type-reference
//! linker's anchor registry.

use crate::error::DocsError;

/// One documented declaration inside a module listing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeDecl {
    /// Declared name, as authors reference it in prose and snippets.
    pub name: String,
    /// Markdown comment shown under the declaration heading.
    #[serde(default)]
    pub comment: String,
    /// Declaration source, rendered as a fenced `ts` snippet.
    #[serde(default)]
    pub snippet: String,
}

/// A public module of the framework with its documented surface.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Module {
    /// Module specifier, e.g. `@skein/kit` or `$app/navigation`.
    pub name: String,
    /// Markdown comment shown under the module heading.
    #[serde(default)]
    pub comment: String,
    /// Named types exported by the module.
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    /// Value exports (functions, stores) of the module.
    #[serde(default)]
    pub exports: Vec<TypeDecl>,
}

/// Which listing a macro expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// The `**TYPES**` macro.
    Types,
    /// The `**EXPORTS**` macro.
    Exports,
}

/// Parses the manifest JSON into modules.
pub fn load_modules(json: &str) -> Result<Vec<Module>, DocsError> {
    serde_json::from_str(json)
        .map_err(|err| DocsError::Internal(format!("invalid module manifest: {err}")))
}

/// Renders the macro listing for `kind` as markdown.
///
/// Each module becomes an `### <name>` heading followed by its comment;
/// each entry of the requested kind becomes an `#### <name>` heading
/// with its comment and declaration snippet. Passing these headings
/// through the section builder yields exactly the anchors the linker
/// registers.
pub fn render_modules(modules: &[Module], kind: ListingKind) -> String {
    let mut out = String::new();

    for module in modules {
        let entries = match kind {
            ListingKind::Types => &module.types,
            ListingKind::Exports => &module.exports,
        };
        if entries.is_empty() {
            continue;
        }

        out.push_str("### ");
        out.push_str(&module.name);
        out.push_str("\n\n");
        if !module.comment.is_empty() {
            out.push_str(&module.comment);
            out.push_str("\n\n");
        }

        for entry in entries {
            out.push_str("#### ");
            out.push_str(&entry.name);
            out.push_str("\n\n");
            if !entry.comment.is_empty() {
                out.push_str(&entry.comment);
                out.push_str("\n\n");
            }
            if !entry.snippet.is_empty() {
                out.push_str("```ts\n");
                out.push_str(&entry.snippet);
                out.push_str("\n```\n\n");
            }
        }
    }

    out
}
