//! Checked rendering for `js`/`ts` snippets.
//!
//! Script snippets are augmented with an ambient prelude, split into
//! virtual files, parsed with `deno_ast`, and only then rendered. A
//! parser diagnostic fails the build unless the snippet opted out via
//! `@noErrors` (which injection adds for snippets without a `file`
//! option).

use std::collections::HashMap;
use std::path::Path;

use deno_ast::{MediaType, ModuleSpecifier, ParseParams};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use skeindocs_core::route_params;

use crate::error::DocsError;
use crate::highlight::{self, Token, TokenKind};

static DATA_LSP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<data-lsp lsp='([^']*)'([^>]*)>(\w+)</data-lsp>").expect("valid regex")
});

/// Renders a checked script snippet to `<pre>` markup with line divs.
pub(crate) fn render_checked(
    source: &str,
    language: &str,
    snippet_file: Option<&str>,
    doc_file: &str,
    hovers: &HashMap<String, String>,
) -> Result<String, DocsError> {
    let injected = inject_prelude(source, language, snippet_file);
    let no_errors = injected.lines().any(|line| line.trim() == "// @noErrors");

    check_virtual_files(&injected, language, doc_file, no_errors)?;

    let display = display_region(&injected);
    let body = render_lines(&display, hovers);
    let alias = highlight::resolve(language).unwrap_or(language);

    let html = format!("<pre class=\"language-{alias}\"><code>{body}</code></pre>");
    let html = DATA_LSP
        .replace_all(&html, |caps: &Captures| {
            let payload = &caps[1];
            let name = &caps[3];
            if payload.is_empty() {
                name.to_string()
            } else {
                format!(
                    "<data-lsp lsp='{}'>{}</data-lsp>",
                    payload.replace('&', "&amp;"),
                    name
                )
            }
        })
        .into_owned();
    Ok(html.replace("<div class='line'></div>", "<div class=\"line\">&nbsp;</div>"))
}

/// Route type aliases synthesized for snippets importing `./$types`.
const ROUTE_TYPE_ALIASES: &[(&str, &str)] = &[
    ("PageLoad", "Kit.Load"),
    ("PageServerLoad", "Kit.ServerLoad"),
    ("LayoutLoad", "Kit.Load"),
    ("LayoutServerLoad", "Kit.ServerLoad"),
    ("RequestHandler", "Kit.RequestHandler"),
    ("Action", "Kit.Action"),
    ("Actions", "Kit.Actions"),
];

/// Prepends ambient declarations the snippet relies on but does not
/// declare. Without an explicit `// @filename:` in the source the
/// prelude is followed by a `// ---cut---` so only authored code
/// displays.
fn inject_prelude(source: &str, language: &str, snippet_file: Option<&str>) -> String {
    let mut injected: Vec<String> = Vec::new();

    if source.contains("$app/") {
        injected.push("// @filename: ambient-kit.d.ts".to_string());
        injected.push("/// <reference types=\"@skein/kit\" />".to_string());
    }

    if source.contains("./$types") && !source.contains("@filename: $types.d.ts") {
        let route = snippet_file
            .map(str::to_string)
            .unwrap_or_else(|| format!("+page.{language}"));
        let params = route_params(&route)
            .iter()
            .map(|name| format!("{name}: string"))
            .collect::<Vec<_>>()
            .join(", ");

        injected.push("// @filename: $types.d.ts".to_string());
        injected.push("import type * as Kit from '@skein/kit';".to_string());
        for (alias, target) in ROUTE_TYPE_ALIASES {
            injected.push(format!("export type {alias} = {target}<{{{params}}}>;"));
        }
    }

    if snippet_file.is_none() {
        injected.push("// @noErrors".to_string());
    }

    if injected.is_empty() {
        return source.to_string();
    }
    let block = injected.join("\n");

    if let Some(idx) = source.find("// @filename:") {
        format!("{}{}\n\n{}", &source[..idx], block, &source[idx..])
    } else {
        // Skip leading directive lines so they stay on top.
        let mut offset = 0;
        for line in source.split_inclusive('\n') {
            if !line.starts_with("// @") {
                break;
            }
            offset += line.len();
        }
        format!(
            "{}{}\n\n// @filename: index.{}\n// ---cut---\n{}",
            &source[..offset],
            block,
            language,
            &source[offset..]
        )
    }
}

struct VirtualFile {
    name: String,
    body: String,
}

fn split_virtual_files(source: &str, language: &str) -> Vec<VirtualFile> {
    let mut files = vec![VirtualFile {
        name: format!("index.{language}"),
        body: String::new(),
    }];
    for line in source.split_inclusive('\n') {
        if let Some(rest) = line.trim_end().strip_prefix("// @filename:") {
            files.push(VirtualFile {
                name: rest.trim().to_string(),
                body: String::new(),
            });
        } else if let Some(file) = files.last_mut() {
            file.body.push_str(line);
        }
    }
    files.retain(|file| !file.body.trim().is_empty());
    files
}

fn check_virtual_files(
    source: &str,
    language: &str,
    doc_file: &str,
    no_errors: bool,
) -> Result<(), DocsError> {
    for file in split_virtual_files(source, language) {
        let specifier = ModuleSpecifier::parse(&format!("file:///{}", file.name))
            .map_err(|e| DocsError::Internal(format!("invalid snippet specifier: {e}")))?;
        let media_type = MediaType::from_path(Path::new(&file.name));

        // The parser recovers from some errors, reporting them on the
        // parsed source instead of failing the parse.
        let diagnostic = match deno_ast::parse_module(ParseParams {
            specifier,
            text: file.body.into(),
            media_type,
            capture_tokens: true,
            scope_analysis: false,
            maybe_syntax: None,
        }) {
            Ok(parsed) => parsed.diagnostics().first().map(ToString::to_string),
            Err(diagnostic) => Some(diagnostic.to_string()),
        };
        if let Some(diagnostic) = diagnostic {
            if no_errors {
                log::debug!("suppressed snippet diagnostic in {doc_file}: {diagnostic}");
            } else {
                log::error!("error compiling snippet in {doc_file}");
                return Err(DocsError::check(doc_file, diagnostic));
            }
        }
    }
    Ok(())
}

/// The authored region: everything after the last `// ---cut---` line,
/// with `// @` directive lines removed.
fn display_region(source: &str) -> String {
    let after_cut = match source.rfind("// ---cut---") {
        Some(idx) => {
            let line_end = source[idx..]
                .find('\n')
                .map(|i| idx + i + 1)
                .unwrap_or(source.len());
            &source[line_end..]
        }
        None => source,
    };
    let kept: Vec<&str> = after_cut
        .lines()
        .filter(|line| !line.starts_with("// @"))
        .collect();
    kept.join("\n")
}

fn render_lines(display: &str, hovers: &HashMap<String, String>) -> String {
    let mut lines: Vec<Vec<Token>> = vec![Vec::new()];
    for token in highlight::scan_script(display) {
        for (index, piece) in token.text.split('\n').enumerate() {
            if index > 0 {
                lines.push(Vec::new());
            }
            if !piece.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push(Token {
                        kind: token.kind,
                        text: piece.to_string(),
                    });
                }
            }
        }
    }

    let mut out = String::new();
    for line in &lines {
        out.push_str("<div class='line'>");
        if is_full_line_comment(line) {
            let text: String = line.iter().map(|token| token.text.as_str()).collect();
            let indent: usize = text
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { 2 } else { 1 })
                .sum();
            out.push_str(&format!(
                "<span class=\"token comment wrapped\" style=\"--indent: {indent}ch\">"
            ));
            highlight::push_escaped(&mut out, &text);
            out.push_str("</span>");
        } else {
            for token in line {
                push_line_token(&mut out, token, hovers);
            }
        }
        out.push_str("</div>");
    }
    out
}

/// A line holding nothing but one comment, optionally indented.
fn is_full_line_comment(line: &[Token]) -> bool {
    match line {
        [only] => only.kind == TokenKind::Comment,
        [ws, comment] => {
            ws.kind == TokenKind::Text
                && ws.text.chars().all(char::is_whitespace)
                && comment.kind == TokenKind::Comment
        }
        _ => false,
    }
}

fn push_line_token(out: &mut String, token: &Token, hovers: &HashMap<String, String>) {
    match token.kind {
        TokenKind::Ident => push_hoverable(out, &token.text, hovers),
        TokenKind::Function => {
            out.push_str("<span class=\"token function\">");
            push_hoverable(out, &token.text, hovers);
            out.push_str("</span>");
        }
        _ => highlight::push_token_html(out, token),
    }
}

/// Wraps identifiers the module manifest knows about in `<data-lsp>`
/// tags carrying their declaration as hover payload. Payloads with a
/// single quote cannot sit in the attribute and are skipped.
fn push_hoverable(out: &mut String, name: &str, hovers: &HashMap<String, String>) {
    match hovers.get(name) {
        Some(payload) if !payload.contains('\'') => {
            out.push_str("<data-lsp lsp='");
            highlight::push_escaped(out, payload);
            out.push_str("'>");
            out.push_str(name);
            out.push_str("</data-lsp>");
        }
        _ => highlight::push_escaped(out, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_hovers() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn ambient_prelude_injected_for_app_imports() {
        let source = "import { goto } from '$app/navigation';\ngoto('/');";
        let injected = inject_prelude(source, "js", Some("+page.js"));
        assert!(injected.starts_with("// @filename: ambient-kit.d.ts"));
        assert!(injected.contains("/// <reference types=\"@skein/kit\" />"));
        assert!(injected.contains("// ---cut---"));
        assert!(injected.ends_with(source));
    }

    #[test]
    fn types_prelude_derives_params_from_route() {
        let source = "/** @type {import('./$types').PageLoad} */\nexport function load() {}";
        let injected = inject_prelude(source, "js", Some("src/routes/blog/[slug]/+page.js"));
        assert!(injected.contains("// @filename: $types.d.ts"));
        assert!(injected.contains("export type PageLoad = Kit.Load<{slug: string}>;"));
        assert!(injected.contains("export type Actions = Kit.Actions<{slug: string}>;"));
    }

    #[test]
    fn existing_types_file_suppresses_prelude() {
        let source = "// @filename: $types.d.ts\nexport type PageLoad = () => void;\n// @filename: index.js\n// ---cut---\nimport './$types';";
        let injected = inject_prelude(source, "js", Some("+page.js"));
        assert_eq!(injected, source);
    }

    #[test]
    fn missing_file_option_injects_no_errors() {
        let injected = inject_prelude("const a = 1;", "js", None);
        assert!(injected.contains("// @noErrors"));
        let checked = render_checked("const a = 1;", "js", None, "test.md", &no_hovers());
        assert!(checked.is_ok());
    }

    #[test]
    fn syntax_error_is_fatal_with_file_option() {
        let result = render_checked("const broken = ;", "js", Some("+page.js"), "10-load.md", &no_hovers());
        match result {
            Err(DocsError::Check { file, .. }) => assert_eq!(file, "10-load.md"),
            other => panic!("expected check error, got {other:?}"),
        }
    }

    #[test]
    fn syntax_error_suppressed_without_file_option() {
        let result = render_checked("const broken = ;", "js", None, "10-load.md", &no_hovers());
        assert!(result.is_ok());
    }

    #[test]
    fn recovered_diagnostic_is_fatal_with_file_option() {
        // `const x;` parses, but the missing initializer is reported as
        // a diagnostic on the parsed source.
        let result = render_checked("const x;", "js", Some("+page.js"), "10-load.md", &no_hovers());
        match result {
            Err(DocsError::Check { file, .. }) => assert_eq!(file, "10-load.md"),
            other => panic!("expected check error, got {other:?}"),
        }
    }

    #[test]
    fn recovered_diagnostic_suppressed_without_file_option() {
        let result = render_checked("const x;", "js", None, "10-load.md", &no_hovers());
        assert!(result.is_ok());
    }

    #[test]
    fn display_region_hides_prelude_and_directives() {
        let source = "// @filename: $types.d.ts\nexport type PageLoad = () => void;\n// @filename: index.js\n// ---cut---\nconst shown = true;";
        let html = render_checked(source, "js", Some("+page.js"), "test.md", &no_hovers())
            .expect("renders");
        assert!(html.contains("shown"));
        assert!(!html.contains("PageLoad"));
        assert!(!html.contains("@filename"));
    }

    #[test]
    fn blank_lines_render_as_nbsp() {
        let html = render_checked("const a = 1;\n\nconst b = 2;", "js", Some("+page.js"), "test.md", &no_hovers())
            .expect("renders");
        assert!(html.contains("<div class=\"line\">&nbsp;</div>"));
    }

    #[test]
    fn line_divs_wrap_each_line() {
        let html = render_checked("const a = 1;\nconst b = 2;", "js", Some("+page.js"), "test.md", &no_hovers())
            .expect("renders");
        assert_eq!(html.matches("<div class='line'>").count(), 2);
        assert!(html.starts_with("<pre class=\"language-javascript\"><code>"));
        assert!(html.ends_with("</code></pre>"));
    }

    #[test]
    fn hover_payload_is_double_escaped() {
        let mut hovers = HashMap::new();
        hovers.insert(
            "goto".to_string(),
            "function goto(url: string): Promise<void>".to_string(),
        );
        let html = render_checked("goto('/about');", "js", Some("+page.js"), "test.md", &hovers)
            .expect("renders");
        assert!(html.contains(
            "<data-lsp lsp='function goto(url: string): Promise&amp;lt;void&amp;gt;'>goto</data-lsp>"
        ));
    }

    #[test]
    fn full_line_comments_get_wrapped_spans() {
        let html = render_checked(
            "\t// a comment that wraps\nconst a = 1;",
            "js",
            Some("+page.js"),
            "test.md",
            &no_hovers(),
        )
        .expect("renders");
        assert!(html.contains(
            "<span class=\"token comment wrapped\" style=\"--indent: 2ch\">\t// a comment that wraps</span>"
        ));
    }

    #[test]
    fn trailing_comments_stay_unwrapped() {
        let html = render_checked("const a = 1; // note", "js", Some("+page.js"), "test.md", &no_hovers())
            .expect("renders");
        assert!(html.contains("<span class=\"token comment\">// note</span>"));
        assert!(!html.contains("wrapped"));
    }

    #[test]
    fn broken_second_virtual_file_is_fatal() {
        let source = "// @filename: a.js\nconst ok = 1;\n// @filename: b.js\nconst broken = ;";
        let result = render_checked(source, "js", Some("+page.js"), "test.md", &no_hovers());
        assert!(matches!(result, Err(DocsError::Check { .. })));
    }
}
