//! JS→TS snippet synthesis.
//!
//! Fenced `js` (and `svelte`) blocks that carry a `/// file:` option
//! get a typed twin appended, produced by turning JSDoc annotations
//! into real TypeScript syntax. Only the annotation shapes the docs
//! actually use are handled; anything else is a hard error so an
//! unconvertible snippet never ships silently untyped.

use std::collections::HashSet;

use deno_ast::swc::ast as swc_ast;
use deno_ast::swc::common::comments::{Comment, CommentKind};
use deno_ast::swc::common::{BytePos, Span, Spanned};
use deno_ast::{MediaType, ModuleSpecifier, ParseParams, ParsedSource, ProgramRef, SourcePos};
use once_cell::sync::Lazy;
use regex::Regex;
use skeindocs_core::EditBuffer;

use crate::error::DocsError;

static JS_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```js\n(.+?)\n```").expect("valid regex"));
static SVELTE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```svelte\n(.+?)\n```").expect("valid regex"));
static SCRIPT_REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script>(.+?)</script>").expect("valid regex"));
static FILE_OPTION_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/// .+?\.)js").expect("valid regex"));
static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));
static TYPE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\('(.+?)'\)\.(\w+)").expect("valid regex"));

/// Appends a TS twin after each convertible `js`/`svelte` block. The
/// pair is retagged `original-*` / `generated-*` so the renderer can
/// attach version classes. Blocks without a `/// file:` option, or
/// where conversion is a no-op, stay single.
pub fn generate_ts_from_js(markdown: &str) -> Result<String, DocsError> {
    let mut out = String::with_capacity(markdown.len());
    let mut last = 0usize;
    for caps in JS_FENCE.captures_iter(markdown) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&markdown[last..whole.start()]);
        last = whole.end();

        if !code.as_str().contains("/// file:") {
            out.push_str(whole.as_str());
            continue;
        }
        match convert_to_ts(code.as_str(), "", "")? {
            None => out.push_str(whole.as_str()),
            Some(ts) => {
                out.push_str(&whole.as_str().replacen("js", "original-js", 1));
                out.push_str("\n```generated-ts\n");
                out.push_str(&ts);
                out.push_str("\n```");
            }
        }
    }
    out.push_str(&markdown[last..]);

    let with_ts = out;
    let mut out = String::with_capacity(with_ts.len());
    let mut last = 0usize;
    for caps in SVELTE_FENCE.captures_iter(&with_ts) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&with_ts[last..whole.start()]);
        last = whole.end();

        if !code.as_str().contains("/// file:") {
            out.push_str(whole.as_str());
            continue;
        }
        // Assumes a single plain <script> block, no module context.
        let script = SCRIPT_REGION.captures(code.as_str());
        let (Some(outer), Some(inner)) = (
            script.as_ref().and_then(|c| c.get(0)),
            script.as_ref().and_then(|c| c.get(1)),
        ) else {
            out.push_str(whole.as_str());
            continue;
        };
        match convert_to_ts(inner.as_str(), "\t", "\n")? {
            None => out.push_str(whole.as_str()),
            Some(ts) => {
                out.push_str(&whole.as_str().replacen("svelte", "original-svelte", 1));
                out.push_str("\n```generated-svelte\n");
                let typed = format!("<script lang=\"ts\">{ts}</script>");
                out.push_str(&code.as_str().replacen(outer.as_str(), &typed, 1));
                out.push_str("\n```");
            }
        }
    }
    out.push_str(&with_ts[last..]);
    Ok(out)
}

/// Converts one snippet. `indent` prefixes synthesized import lines,
/// `offset` goes in front of the whole import block (the svelte path
/// needs a leading newline inside the script tag). Returns `None` when
/// nothing needed converting.
fn convert_to_ts(js_code: &str, indent: &str, offset: &str) -> Result<Option<String>, DocsError> {
    let js_code = js_code.replace("// @filename: index.js", "// @filename: index.ts");
    let js_code = FILE_OPTION_EXTENSION.replace(&js_code, "${1}ts").into_owned();
    // *\/ appears in JSDoc-in-JSDoc examples; restore the real sequence.
    let js_code = js_code.replace("*\\/", "*/");

    let specifier = ModuleSpecifier::parse("file:///convert.ts")
        .map_err(|e| DocsError::Internal(format!("invalid conversion specifier: {e}")))?;
    // A snippet that does not parse is left for the script checker to
    // report with its file context; conversion just does not happen.
    let parsed = match deno_ast::parse_module(ParseParams {
        specifier,
        text: js_code.clone().into(),
        media_type: MediaType::TypeScript,
        capture_tokens: true,
        scope_analysis: false,
        maybe_syntax: None,
    }) {
        Ok(parsed) => parsed,
        Err(diagnostic) => {
            log::debug!("snippet left unconverted, parse failed: {diagnostic}");
            return Ok(None);
        }
    };

    let module = match parsed.program_ref() {
        ProgramRef::Module(module) => module,
        ProgramRef::Script(_) => {
            return Err(DocsError::Internal("snippet parsed as a script".to_string()));
        }
    };

    let mut converter = Converter {
        source: &js_code,
        parsed: &parsed,
        edits: EditBuffer::new(&js_code),
        imports: Vec::new(),
        consumed: HashSet::new(),
    };
    converter.walk_module_items(&module.body)?;
    converter.sweep_unhandled()?;
    converter.insert_imports(module, indent, offset);

    let transformed = converter.edits.build();
    if transformed == js_code {
        Ok(None)
    } else {
        Ok(Some(
            EXTRA_BLANK_LINES.replace_all(&transformed, "\n\n").into_owned(),
        ))
    }
}

struct Converter<'a> {
    source: &'a str,
    parsed: &'a ParsedSource,
    edits: EditBuffer<'a>,
    /// Import source → type names, in first-seen order.
    imports: Vec<(String, Vec<String>)>,
    /// Byte ranges of JSDoc comments an edit consumed.
    consumed: HashSet<(usize, usize)>,
}

impl<'a> Converter<'a> {
    /// Parser spans do not start at zero; edits index the snippet text
    /// directly.
    fn byte_index(&self, pos: BytePos) -> usize {
        SourcePos::unsafely_from_byte_pos(pos)
            .as_byte_index(self.parsed.text_info_lazy().range().start)
    }

    fn walk_module_items(&mut self, items: &[swc_ast::ModuleItem]) -> Result<(), DocsError> {
        for item in items {
            match item {
                swc_ast::ModuleItem::ModuleDecl(swc_ast::ModuleDecl::ExportDecl(export)) => {
                    self.visit_decl(&export.decl, Some(export.span))?;
                }
                swc_ast::ModuleItem::Stmt(stmt) => self.walk_stmt(stmt)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &swc_ast::Stmt) -> Result<(), DocsError> {
        match stmt {
            swc_ast::Stmt::Decl(decl) => self.visit_decl(decl, None),
            swc_ast::Stmt::Block(block) => self.walk_block(block),
            swc_ast::Stmt::If(if_stmt) => {
                self.walk_stmt(&if_stmt.cons)?;
                if let Some(alt) = &if_stmt.alt {
                    self.walk_stmt(alt)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn walk_block(&mut self, block: &swc_ast::BlockStmt) -> Result<(), DocsError> {
        for stmt in &block.stmts {
            self.walk_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_decl(&mut self, decl: &swc_ast::Decl, export_span: Option<Span>) -> Result<(), DocsError> {
        match decl {
            swc_ast::Decl::Fn(fn_decl) => self.visit_fn(fn_decl, export_span),
            swc_ast::Decl::Var(var) => self.visit_var(var, export_span),
            _ => Ok(()),
        }
    }

    /// `@type` on a function declaration rewrites the head into a typed
    /// const with an arrow body; `@param` annotates the sole parameter.
    fn visit_fn(&mut self, fn_decl: &swc_ast::FnDecl, export_span: Option<Span>) -> Result<(), DocsError> {
        let function = &fn_decl.function;
        let node_start = export_span.map(|span| span.lo).unwrap_or(function.span.lo);

        for comment in self.leading_jsdoc(node_start) {
            let mut modified = false;
            for tag in parse_tags(&comment.text) {
                match tag {
                    JsDocTag::Type(None) => return Err(self.unsupported(self.source)),
                    JsDocTag::Type(Some(expression)) => {
                        let name = self.type_name(&expression);
                        let head = format!(
                            "{}const {}: {} = {}",
                            if export_span.is_some() { "export " } else { "" },
                            fn_decl.ident.sym,
                            name,
                            if function.is_async { "async " } else { "" },
                        );
                        let lo = self.byte_index(node_start);
                        let hi = self.byte_index(fn_decl.ident.span.hi);
                        self.edits.overwrite(lo, hi, head);
                        let Some(body) = &function.body else {
                            return Err(self.unsupported(self.source));
                        };
                        let arrow = self.byte_index(body.span.lo);
                        self.edits.append_left(arrow, "=> ");
                        modified = true;
                    }
                    JsDocTag::Param(expression) => {
                        if function.params.len() != 1 {
                            let text = &self.source[self.byte_index(node_start)
                                ..self.byte_index(function.span.hi)];
                            return Err(self.unsupported(text));
                        }
                        let name = self.type_name(&expression);
                        let after_param = self.byte_index(function.params[0].span.hi);
                        self.edits.append_left(after_param, format!(": {name}"));
                        modified = true;
                    }
                }
            }
            if modified {
                self.consume(&comment);
            }
        }

        if let Some(body) = &function.body {
            self.walk_block(body)?;
        }
        Ok(())
    }

    /// `@type` on a single-declarator statement becomes an annotation
    /// on the binding. `@param` has no meaning here and is left alone.
    fn visit_var(&mut self, var: &swc_ast::VarDecl, export_span: Option<Span>) -> Result<(), DocsError> {
        let node_start = export_span.map(|span| span.lo).unwrap_or(var.span.lo);

        for comment in self.leading_jsdoc(node_start) {
            let mut modified = false;
            for tag in parse_tags(&comment.text) {
                match tag {
                    JsDocTag::Type(None) => return Err(self.unsupported(self.source)),
                    JsDocTag::Type(Some(expression)) => {
                        if var.decls.len() != 1 {
                            return Err(self.unsupported(self.source));
                        }
                        let name = self.type_name(&expression);
                        let after_binding = self.byte_index(var.decls[0].name.span().hi);
                        self.edits.append_left(after_binding, format!(": {name}"));
                        modified = true;
                    }
                    JsDocTag::Param(_) => {}
                }
            }
            if modified {
                self.consume(&comment);
            }
        }

        for declarator in &var.decls {
            match declarator.init.as_deref() {
                Some(swc_ast::Expr::Arrow(arrow)) => {
                    if let swc_ast::BlockStmtOrExpr::BlockStmt(block) = &*arrow.body {
                        self.walk_block(block)?;
                    }
                }
                Some(swc_ast::Expr::Fn(fn_expr)) => {
                    if let Some(body) = &fn_expr.function.body {
                        self.walk_block(body)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn leading_jsdoc(&self, lo: BytePos) -> Vec<Comment> {
        self.parsed
            .comments()
            .get_leading(SourcePos::unsafely_from_byte_pos(lo))
            .map(|comments| comments.to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter(|comment| {
                comment.kind == CommentKind::Block && comment.text.starts_with('*')
            })
            .collect()
    }

    fn consume(&mut self, comment: &Comment) {
        let lo = self.byte_index(comment.span.lo);
        let hi = self.byte_index(comment.span.hi);
        self.edits.delete(lo, hi);
        self.consumed.insert((lo, hi));
    }

    /// Resolves the annotation text to the name used in the emitted
    /// TS, recording an `import type` for `import('...').Name` forms.
    fn type_name(&mut self, expression: &str) -> String {
        match TYPE_IMPORT.captures(expression) {
            Some(caps) => {
                let from = caps[1].to_string();
                let name = caps[2].to_string();
                match self.imports.iter_mut().find(|(source, _)| *source == from) {
                    Some((_, names)) => {
                        if !names.contains(&name) {
                            names.push(name.clone());
                        }
                    }
                    None => self.imports.push((from, vec![name.clone()])),
                }
                name
            }
            None => expression.to_string(),
        }
    }

    /// A leftover `@type` JSDoc after the walk means the annotation
    /// sits somewhere the conversion cannot express.
    fn sweep_unhandled(&self) -> Result<(), DocsError> {
        for comment in self.parsed.comments().get_vec() {
            let range = (self.byte_index(comment.span.lo), self.byte_index(comment.span.hi));
            if comment.kind == CommentKind::Block
                && comment.text.starts_with('*')
                && !self.consumed.contains(&range)
                && has_type_tag(&comment.text)
            {
                return Err(self.unsupported(self.source));
            }
        }
        Ok(())
    }

    fn insert_imports(&mut self, module: &swc_ast::Module, indent: &str, offset: &str) {
        if self.imports.is_empty() {
            return;
        }
        let statements = self
            .imports
            .iter()
            .map(|(from, names)| {
                format!("{indent}import type {{ {} }} from '{from}';", names.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let last_import_end = module.body.iter().rev().find_map(|item| match item {
            swc_ast::ModuleItem::ModuleDecl(swc_ast::ModuleDecl::Import(import)) => {
                Some(self.byte_index(import.span.hi) + 1)
            }
            _ => None,
        });
        // New imports go below an existing cut or file marker so they
        // stay out of the hidden prelude.
        let marker_point = if let Some(idx) = self.source.find("---cut---") {
            line_after(self.source, idx)
        } else if let Some(idx) = self.source.find("/// file:") {
            line_after(self.source, idx)
        } else {
            0
        };

        let insertion = marker_point
            .max(last_import_end.unwrap_or(0))
            .min(self.source.len());
        self.edits.append_left(insertion, format!("{offset}{statements}\n"));
    }

    fn unsupported(&self, snippet: &str) -> DocsError {
        DocsError::UnsupportedJsDoc {
            snippet: snippet.to_string(),
        }
    }
}

enum JsDocTag {
    /// `@type {...}`; `None` when the braces are missing or unbalanced.
    Type(Option<String>),
    Param(String),
}

/// Extracts tags from JSDoc text, line-wise like a JSDoc parser: a tag
/// only counts at the start of a line after the `*` gutter.
fn parse_tags(text: &str) -> Vec<JsDocTag> {
    let mut tags = Vec::new();
    for line in text.lines() {
        let content = line.trim_start().trim_start_matches('*').trim_start();
        if let Some(after) = tag_suffix(content, "@type") {
            tags.push(JsDocTag::Type(braced(after.trim_start())));
        } else if let Some(after) = tag_suffix(content, "@param") {
            if let Some(expression) = braced(after.trim_start()) {
                tags.push(JsDocTag::Param(expression));
            }
        }
    }
    tags
}

fn tag_suffix<'t>(content: &'t str, tag: &str) -> Option<&'t str> {
    let rest = content.strip_prefix(tag)?;
    if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(rest)
}

/// Content of a balanced `{...}` group at the start of `text`.
fn braced(text: &str) -> Option<String> {
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[1..idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn has_type_tag(text: &str) -> bool {
    text.lines().any(|line| {
        let content = line.trim_start().trim_start_matches('*').trim_start();
        tag_suffix(content, "@type").is_some()
    })
}

fn line_after(source: &str, idx: usize) -> usize {
    source[idx..].find('\n').map(|i| idx + i + 1).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_turns_a_function_into_a_typed_const() {
        let input = "/// file: index.js\n/** @type {() => void} */\nfunction f() {}";
        let output = convert_to_ts(input, "", "").expect("converts");
        assert_eq!(
            output.as_deref(),
            Some("/// file: index.ts\n\nconst f: () => void = () => {}")
        );
    }

    #[test]
    fn exported_async_function_keeps_both_qualifiers() {
        let input =
            "/// file: index.js\n/** @type {() => Promise<void>} */\nexport async function go() {}";
        let output = convert_to_ts(input, "", "").expect("converts");
        assert_eq!(
            output.as_deref(),
            Some("/// file: index.ts\n\nexport const go: () => Promise<void> = async () => {}")
        );
    }

    #[test]
    fn imported_type_annotates_the_binding_and_adds_an_import() {
        let input = "/// file: src/routes/+page.js\n/** @type {import('./$types').PageLoad} */\nexport const load = () => {\n\treturn {};\n};";
        let output = convert_to_ts(input, "", "").expect("converts");
        assert_eq!(
            output.as_deref(),
            Some("/// file: src/routes/+page.ts\nimport type { PageLoad } from './$types';\n\nexport const load: PageLoad = () => {\n\treturn {};\n};")
        );
    }

    #[test]
    fn param_tag_annotates_a_single_parameter() {
        let input = "/// file: index.js\n/** @param {string} message */\nexport function log(message) {\n\tconsole.log(message);\n}";
        let output = convert_to_ts(input, "", "").expect("converts");
        assert_eq!(
            output.as_deref(),
            Some("/// file: index.ts\n\nexport function log(message: string) {\n\tconsole.log(message);\n}")
        );
    }

    #[test]
    fn unannotated_snippet_reports_no_change() {
        let output = convert_to_ts("/// file: index.js\nconst a = 1;", "", "").expect("converts");
        assert_eq!(output, None);
    }

    #[test]
    fn converted_output_is_a_fixed_point() {
        let input = "/// file: index.js\n/** @type {() => void} */\nfunction f() {}";
        let once = convert_to_ts(input, "", "")
            .expect("converts")
            .expect("changes");
        let twice = convert_to_ts(&once, "", "").expect("converts");
        assert_eq!(twice, None);
    }

    #[test]
    fn multiple_params_are_unsupported() {
        let input = "/** @param {string} a */\nexport function add(a, b) {}";
        let result = convert_to_ts(input, "", "");
        assert!(matches!(result, Err(DocsError::UnsupportedJsDoc { .. })));
    }

    #[test]
    fn type_tag_in_an_object_literal_is_unsupported() {
        let input = "const o = {\n\t/** @type {string} */\n\tkey: 'v'\n};";
        let result = convert_to_ts(input, "", "");
        assert!(matches!(result, Err(DocsError::UnsupportedJsDoc { .. })));
    }

    #[test]
    fn braceless_type_tag_is_unsupported() {
        let input = "/** @type */\nconst a = 1;";
        let result = convert_to_ts(input, "", "");
        assert!(matches!(result, Err(DocsError::UnsupportedJsDoc { .. })));
    }

    #[test]
    fn js_fence_with_file_option_gets_a_generated_twin() {
        let markdown = "# T\n\n```js\n/// file: index.js\n/** @type {() => void} */\nfunction f() {}\n```\n\ntail";
        let output = generate_ts_from_js(markdown).expect("generates");
        assert_eq!(
            output,
            "# T\n\n```original-js\n/// file: index.js\n/** @type {() => void} */\nfunction f() {}\n```\n```generated-ts\n/// file: index.ts\n\nconst f: () => void = () => {}\n```\n\ntail"
        );
    }

    #[test]
    fn js_fence_without_file_option_is_left_alone() {
        let markdown = "```js\n/** @type {number} */\nlet n;\n```";
        let output = generate_ts_from_js(markdown).expect("generates");
        assert_eq!(output, markdown);
    }

    #[test]
    fn unchanged_conversion_leaves_the_fence_single() {
        let markdown = "```js\n/// file: index.js\nconst a = 1;\n```";
        let output = generate_ts_from_js(markdown).expect("generates");
        assert_eq!(output, markdown);
    }

    #[test]
    fn svelte_fence_converts_the_script_region() {
        let markdown = "```svelte\n/// file: src/routes/+page.svelte\n<script>\n\t/** @type {import('./$types').PageData} */\n\texport let data;\n</script>\n\n<h1>{data.title}</h1>\n```";
        let output = generate_ts_from_js(markdown).expect("generates");
        assert!(output.starts_with("```original-svelte\n"));
        assert!(output.contains("\n```generated-svelte\n"));
        assert!(output.contains(
            "<script lang=\"ts\">\n\timport type { PageData } from './$types';\n\n\texport let data: PageData;\n</script>"
        ));
        assert!(output.contains("<h1>{data.title}</h1>"));
    }

    #[test]
    fn nested_annotations_inside_function_bodies_convert() {
        let input = "/// file: index.js\nexport function outer() {\n\t/** @type {number} */\n\tlet count = 0;\n\treturn count;\n}";
        let output = convert_to_ts(input, "", "").expect("converts");
        assert_eq!(
            output.as_deref(),
            Some("/// file: index.ts\nexport function outer() {\n\t\n\tlet count: number = 0;\n\treturn count;\n}")
        );
    }
}
