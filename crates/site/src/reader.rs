//! Document loading.
//!
//! Pages live as `NN-name.md` files in a docs directory. Reading a
//! page expands the manifest macros, lifts front matter, synthesizes
//! TS twins and renders the body. `read_all` does this for a whole
//! directory in parallel.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use skeindocs_core::extract_frontmatter;

use crate::cache::SnippetCache;
use crate::error::DocsError;
use crate::linker::TypeLinks;
use crate::manifest::{ListingKind, Module, load_modules, render_modules};
use crate::markdown::{Section, render_page};
use crate::renderer::RenderContext;
use crate::synthesize::generate_ts_from_js;

static PAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}-(.+)\.md$").expect("valid regex"));

/// Shared state for reading a docs directory: the parsed manifest,
/// the linker and hover payloads derived from it, and the snippet
/// cache.
pub struct DocsContext {
    modules: Vec<Module>,
    links: TypeLinks,
    hovers: HashMap<String, String>,
    cache: SnippetCache,
}

impl DocsContext {
    /// Builds a context from manifest JSON. `cache_dir` keeps rendered
    /// snippet HTML across runs.
    pub fn new(manifest_json: &str, cache_dir: impl Into<PathBuf>) -> Result<Self, DocsError> {
        let modules = load_modules(manifest_json)?;
        let links = TypeLinks::from_modules(&modules)?;
        let hovers = declaration_hovers(&modules);
        Ok(DocsContext {
            modules,
            links,
            hovers,
            cache: SnippetCache::new(cache_dir),
        })
    }

    /// The parsed manifest modules.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }
}

/// Identifier → one-line declaration, attached to matching script
/// tokens as hover payloads.
fn declaration_hovers(modules: &[Module]) -> HashMap<String, String> {
    let mut hovers = HashMap::new();
    for module in modules {
        for decl in module.types.iter().chain(&module.exports) {
            let Some(line) = decl.snippet.lines().find(|line| !line.trim().is_empty()) else {
                continue;
            };
            hovers.insert(decl.name.clone(), line.trim().to_string());
        }
    }
    hovers
}

/// A rendered documentation page.
#[derive(Debug, Serialize)]
pub struct Document {
    /// Source file name.
    pub file: String,
    /// URL slug from the numbered file name.
    pub slug: String,
    /// Page title from front matter.
    pub title: String,
    /// Rendered body HTML.
    pub content: String,
    /// Section tree for the page's table of contents.
    pub sections: Vec<Section>,
    /// Front matter entries other than the title.
    pub metadata: JsonValue,
}

/// Reads and renders one page. Files that do not follow the
/// `NN-name.md` naming are skipped with `Ok(None)`.
pub fn read_file(path: &Path, ctx: &DocsContext) -> Result<Option<Document>, DocsError> {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(caps) = PAGE_NAME.captures(&file) else {
        log::debug!("skipping {file}: not a numbered docs page");
        return Ok(None);
    };
    let slug = caps[1].to_string();

    let markdown = fs::read_to_string(path)?;
    let markdown = expand_macro(markdown, "**TYPES**", &ctx.modules, ListingKind::Types);
    let markdown = expand_macro(markdown, "**EXPORTS**", &ctx.modules, ListingKind::Exports);

    let frontmatter =
        extract_frontmatter(&markdown).map_err(|err| DocsError::frontmatter(&file, err))?;
    let Some(title) = frontmatter.title().map(str::to_string) else {
        return Err(DocsError::frontmatter(file, "missing required `title` entry"));
    };

    let body = generate_ts_from_js(&markdown[frontmatter.body_start..])?;

    let render = RenderContext {
        cache: &ctx.cache,
        links: &ctx.links,
        hovers: &ctx.hovers,
        file: &file,
    };
    let page = render_page(&body, &render)?;

    let mut metadata = frontmatter.metadata;
    if let Some(object) = metadata.as_object_mut() {
        object.remove("title");
    }

    Ok(Some(Document {
        file,
        slug,
        title,
        content: page.html,
        sections: page.sections,
        metadata,
    }))
}

fn expand_macro(markdown: String, needle: &str, modules: &[Module], kind: ListingKind) -> String {
    if markdown.contains(needle) {
        markdown.replacen(needle, &render_modules(modules, kind), 1)
    } else {
        markdown
    }
}

/// Reads every numbered page in `dir`, in file-name order.
pub fn read_all(dir: &Path, ctx: &DocsContext) -> Result<Vec<Document>, DocsError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let documents = paths
        .par_iter()
        .map(|path| read_file(path, ctx))
        .collect::<Result<Vec<_>, DocsError>>()?;
    Ok(documents.into_iter().flatten().collect())
}
