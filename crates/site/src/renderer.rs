//! The fenced code-block pipeline.
//!
//! Rendering is a memoized pure function: the digest over the raw
//! snippet decides a cache hit before any processing happens, and the
//! fully linked block is what gets stored.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::cache::SnippetCache;
use crate::error::DocsError;
use crate::highlight;
use crate::linker::{LinkScope, TypeLinks};
use crate::script;

static OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^/// (.+?): (.+)\n").expect("valid regex"));
static MARKDOWN_INDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([\-\+])?((?:    )+)").expect("valid regex"));

/// Per-document state shared by every snippet render.
pub struct RenderContext<'a> {
    /// Snippet cache keyed by content digest.
    pub cache: &'a SnippetCache,
    /// Linker built from the module manifest.
    pub links: &'a TypeLinks,
    /// Identifier → declaration hover payloads for script snippets.
    pub hovers: &'a HashMap<String, String>,
    /// Document path, for error reporting.
    pub file: &'a str,
}

/// Renders one fenced block to its final HTML. `current_title` is the
/// section the block sits under; its name is exempt from linking.
pub fn render_code_block(
    raw_source: &str,
    language: &str,
    current_title: &str,
    ctx: &RenderContext<'_>,
) -> Result<String, DocsError> {
    let digest = SnippetCache::digest(raw_source, language, current_title);
    if let Some(cached) = ctx.cache.get(&digest) {
        return Ok(cached);
    }

    let mut options: HashMap<String, String> = HashMap::new();
    let source = OPTION_LINE
        .replace_all(raw_source, |caps: &Captures| {
            options.insert(caps[1].to_string(), caps[2].to_string());
            String::new()
        })
        .into_owned();

    // Snippets indented with 4-space runs collapse to the 2-space
    // display convention. Diff markers keep their line, with the
    // indent behind the marker still collapsed.
    let source = MARKDOWN_INDENT
        .replace_all(&source, |caps: &Captures| {
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if !prefix.is_empty() && language != "diff" {
                return caps[0].to_string();
            }
            let units = caps[2].len() / 4;
            format!("{prefix}{}", "  ".repeat(units))
        })
        .into_owned()
        .replace("*\\/", "*/");

    let (language, version_class) = match language {
        "generated-ts" | "generated-svelte" => (&language["generated-".len()..], " ts-version"),
        "original-js" | "original-svelte" => (&language["original-".len()..], " js-version"),
        _ => (language, ""),
    };

    let snippet_file = options.get("file").map(String::as_str);
    let suppress_links = options.get("link").map(String::as_str) == Some("false");

    let html = if language == "js" || language == "ts" {
        script::render_checked(&source, language, snippet_file, ctx.file, ctx.hovers)?
    } else if language == "diff" {
        render_diff(&source)
    } else {
        let alias = highlight::resolve(language).unwrap_or(language);
        let highlighted = highlight::highlight(&source, alias);
        format!("<pre class=\"language-{alias}\"><code>{highlighted}</code></pre>")
    };

    let heading = match snippet_file {
        Some(file) => format!("<h5>{file}</h5>"),
        None => String::new(),
    };
    let html = format!("<div class=\"code-block{version_class}\">{heading}{html}</div>");

    let scope = if language == "js" || language == "ts" {
        LinkScope::Comments
    } else {
        LinkScope::Everywhere
    };
    let html = ctx
        .links
        .link_types(&html, Some(current_title), suppress_links, scope);

    ctx.cache.put(&digest, &html);
    Ok(html)
}

/// Line-classified rendering for `diff` blocks. The marker character
/// is consumed; its line gets the matching span class.
fn render_diff(source: &str) -> String {
    let mut out = String::from("<pre class=\"language-diff\"><code>");
    for line in source.split('\n') {
        if let Some(content) = line.strip_prefix('+') {
            out.push_str("<span class=\"inserted\">");
            highlight::push_escaped(&mut out, content);
            out.push_str("\n</span>");
        } else if let Some(content) = line.strip_prefix('-') {
            out.push_str("<span class=\"deleted\">");
            highlight::push_escaped(&mut out, content);
            out.push_str("\n</span>");
        } else {
            highlight::push_escaped(&mut out, line);
            out.push('\n');
        }
    }
    out.push_str("</code></pre>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_modules;

    const MANIFEST: &str = r#"[
        {
            "name": "@skein/kit",
            "comment": "",
            "types": [{ "name": "Config", "snippet": "interface Config {}" }],
            "exports": [{ "name": "error", "snippet": "function error(status: number): never;" }]
        }
    ]"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        cache: SnippetCache,
        links: TypeLinks,
        hovers: HashMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let cache = SnippetCache::new(dir.path());
            let links =
                TypeLinks::from_modules(&load_modules(MANIFEST).expect("manifest")).expect("links");
            Self {
                _dir: dir,
                cache,
                links,
                hovers: HashMap::new(),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                cache: &self.cache,
                links: &self.links,
                hovers: &self.hovers,
                file: "test.md",
            }
        }
    }

    #[test]
    fn option_lines_become_a_file_heading() {
        let fixture = Fixture::new();
        let html = render_code_block(
            "/// file: src/app.css\nbody {\n    color: red;\n}",
            "css",
            "",
            &fixture.ctx(),
        )
        .expect("renders");
        assert!(html.starts_with("<div class=\"code-block\"><h5>src/app.css</h5>"));
        assert!(!html.contains("/// file"));
        assert!(html.contains("\n  <span class=\"token property\">color</span>"));
    }

    #[test]
    fn rendered_blocks_are_cached_by_digest() {
        let fixture = Fixture::new();
        let first = render_code_block("body {}", "css", "", &fixture.ctx()).expect("renders");
        let digest = SnippetCache::digest("body {}", "css", "");
        assert_eq!(fixture.cache.get(&digest), Some(first.clone()));
        let second = render_code_block("body {}", "css", "", &fixture.ctx()).expect("renders");
        assert_eq!(first, second);
    }

    #[test]
    fn diff_lines_are_classified() {
        let fixture = Fixture::new();
        let html =
            render_code_block("+added\n-removed\nsame\n", "diff", "", &fixture.ctx()).expect("renders");
        assert!(html.contains(
            "<span class=\"inserted\">added\n</span><span class=\"deleted\">removed\n</span>same\n"
        ));
        assert!(html.contains("<pre class=\"language-diff\">"));
    }

    #[test]
    fn diff_markers_survive_indent_normalization() {
        let fixture = Fixture::new();
        let html =
            render_code_block("+        added", "diff", "", &fixture.ctx()).expect("renders");
        assert!(html.contains("<span class=\"inserted\">    added\n</span>"));
    }

    #[test]
    fn marker_lines_outside_diff_stay_untouched() {
        let fixture = Fixture::new();
        let html = render_code_block("+    keep", "", "", &fixture.ctx()).expect("renders");
        assert!(html.contains("+    keep"));
    }

    #[test]
    fn generated_ts_gets_the_ts_version_class() {
        let fixture = Fixture::new();
        let html =
            render_code_block("const a = 1;", "generated-ts", "", &fixture.ctx()).expect("renders");
        assert!(html.starts_with("<div class=\"code-block ts-version\">"));
        assert!(html.contains("language-typescript"));
    }

    #[test]
    fn original_js_gets_the_js_version_class() {
        let fixture = Fixture::new();
        let html =
            render_code_block("const a = 1;", "original-js", "", &fixture.ctx()).expect("renders");
        assert!(html.starts_with("<div class=\"code-block js-version\">"));
        assert!(html.contains("language-javascript"));
    }

    #[test]
    fn known_types_link_outside_script_blocks() {
        let fixture = Fixture::new();
        let html = render_code_block("Config", "", "Other", &fixture.ctx()).expect("renders");
        assert!(html.contains("<a href=\"#skein-kit-config\">Config</a>"));
    }

    #[test]
    fn link_false_option_suppresses_linking() {
        let fixture = Fixture::new();
        let html =
            render_code_block("/// link: false\nConfig", "", "Other", &fixture.ctx()).expect("renders");
        assert!(!html.contains("<a href"));
    }

    #[test]
    fn current_section_title_is_not_self_linked() {
        let fixture = Fixture::new();
        let html = render_code_block("Config", "", "Config", &fixture.ctx()).expect("renders");
        assert!(!html.contains("<a href"));
    }

    #[test]
    fn script_blocks_render_line_divs() {
        let fixture = Fixture::new();
        let html = render_code_block(
            "/// file: src/routes/+page.js\nconst answer = 42;",
            "js",
            "",
            &fixture.ctx(),
        )
        .expect("renders");
        assert!(html.starts_with("<div class=\"code-block\"><h5>src/routes/+page.js</h5>"));
        assert!(html.contains("<pre class=\"language-javascript\"><code><div class='line'>"));
    }
}
