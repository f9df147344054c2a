//! Token highlighting for non-script snippet languages.
//!
//! Produces Prism-compatible `<span class="token ...">` markup from a
//! small set of hand-rolled scanners. The script path reuses the same
//! scanner through [`scan_script`] so both pipelines classify tokens
//! identically.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Language tag → highlighter alias, as used in `language-*` classes.
pub static LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bash", "bash"),
        ("env", "bash"),
        ("html", "markup"),
        ("svelte", "svelte"),
        ("js", "javascript"),
        ("css", "css"),
        ("diff", "diff"),
        ("ts", "typescript"),
        ("", ""),
    ])
});

/// Resolves a fence language tag to its highlighter alias.
pub fn resolve(language: &str) -> Option<&'static str> {
    LANGUAGES.get(language).copied().filter(|alias| !alias.is_empty())
}

/// Escapes `&`, `<` and `>` for code text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

pub(crate) fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Classification of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Comment,
    String,
    Keyword,
    Function,
    Number,
    Boolean,
    Operator,
    Punctuation,
    Property,
    Tag,
    AttrName,
    AttrValue,
    /// Identifier with no more specific class; rendered bare.
    Ident,
    /// Whitespace and anything unclassified; rendered bare.
    Text,
}

impl TokenKind {
    fn class(self) -> Option<&'static str> {
        match self {
            TokenKind::Comment => Some("comment"),
            TokenKind::String => Some("string"),
            TokenKind::Keyword => Some("keyword"),
            TokenKind::Function => Some("function"),
            TokenKind::Number => Some("number"),
            TokenKind::Boolean => Some("boolean"),
            TokenKind::Operator => Some("operator"),
            TokenKind::Punctuation => Some("punctuation"),
            TokenKind::Property => Some("property"),
            TokenKind::Tag => Some("tag"),
            TokenKind::AttrName => Some("attr-name"),
            TokenKind::AttrValue => Some("attr-value"),
            TokenKind::Ident | TokenKind::Text => None,
        }
    }
}

/// One scanned token with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Highlights `source` for a resolved alias. Aliases without a scanner
/// fall back to plain escaping.
pub fn highlight(source: &str, alias: &str) -> String {
    let tokens = match alias {
        "javascript" | "typescript" => scan_script(source),
        "bash" => scan_shell(source),
        "css" => scan_css(source),
        "markup" => scan_markup(source, false),
        "svelte" => scan_markup(source, true),
        _ => return escape(source),
    };
    html_for(&tokens)
}

pub(crate) fn html_for(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        push_token_html(&mut out, token);
    }
    out
}

pub(crate) fn push_token_html(out: &mut String, token: &Token) {
    match token.kind.class() {
        Some(class) => {
            out.push_str("<span class=\"token ");
            out.push_str(class);
            out.push_str("\">");
            push_escaped(out, &token.text);
            out.push_str("</span>");
        }
        None => push_escaped(out, &token.text),
    }
}

const SCRIPT_KEYWORDS: &[&str] = &[
    "abstract", "any", "as", "async", "await", "break", "case", "catch", "class", "const",
    "continue", "debugger", "declare", "default", "delete", "do", "else", "enum", "export",
    "extends", "finally", "for", "from", "function", "get", "if", "implements", "import", "in",
    "instanceof", "interface", "keyof", "let", "namespace", "never", "new", "null", "of",
    "readonly", "return", "satisfies", "set", "static", "string", "super", "switch", "this",
    "throw", "try", "type", "typeof", "undefined", "unknown", "var", "void", "while", "yield",
];

const OPERATOR_CHARS: &str = "=+-*/%<>!&|^~?";

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Scans JS/TS-family source into tokens. Template literals are kept
/// whole; interpolations are not re-entered.
pub(crate) fn scan_script(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("//") {
            let end = rest.find('\n').unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Comment, &rest[..end]));
            rest = &rest[end..];
        } else if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Comment, &rest[..end]));
            rest = &rest[end..];
        } else if ch == '\'' || ch == '"' || ch == '`' {
            let end = string_end(rest, ch);
            tokens.push(Token::new(TokenKind::String, &rest[..end]));
            rest = &rest[end..];
        } else if ch.is_ascii_digit() {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Number, &rest[..end]));
            rest = &rest[end..];
        } else if is_ident_start(ch) {
            let end = rest.find(|c: char| !is_ident_continue(c)).unwrap_or(rest.len());
            let word = &rest[..end];
            let after = rest[end..].trim_start();
            let kind = if word == "true" || word == "false" {
                TokenKind::Boolean
            } else if SCRIPT_KEYWORDS.contains(&word) {
                TokenKind::Keyword
            } else if after.starts_with('(') {
                TokenKind::Function
            } else {
                TokenKind::Ident
            };
            tokens.push(Token::new(kind, word));
            rest = &rest[end..];
        } else if OPERATOR_CHARS.contains(ch) {
            let end = rest
                .find(|c: char| !OPERATOR_CHARS.contains(c))
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Operator, &rest[..end]));
            rest = &rest[end..];
        } else if "()[]{};,.:".contains(ch) {
            tokens.push(Token::new(TokenKind::Punctuation, ch.to_string()));
            rest = &rest[ch.len_utf8()..];
        } else {
            push_text(&mut tokens, ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    tokens
}

/// End index (exclusive) of a string literal starting at byte 0 of
/// `rest` with delimiter `delim`, honoring backslash escapes.
fn string_end(rest: &str, delim: char) -> usize {
    let mut escaped = false;
    for (idx, ch) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delim {
            return idx + ch.len_utf8();
        } else if ch == '\n' && delim != '`' {
            // Unterminated single-line string; stop at the line break.
            return idx;
        }
    }
    rest.len()
}

fn push_text(tokens: &mut Vec<Token>, ch: char) {
    if let Some(last) = tokens.last_mut() {
        if last.kind == TokenKind::Text {
            last.text.push(ch);
            return;
        }
    }
    tokens.push(Token::new(TokenKind::Text, ch.to_string()));
}

const SHELL_KEYWORDS: &[&str] = &[
    "if", "then", "elif", "else", "fi", "for", "in", "do", "done", "while", "until", "case",
    "esac", "function", "select", "time",
];

/// Scans shell source. The word in command position becomes a
/// `function` token, matching how shell highlighters treat invocations.
fn scan_shell(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut command_position = true;

    while let Some(ch) = rest.chars().next() {
        if ch == '#' {
            let end = rest.find('\n').unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Comment, &rest[..end]));
            rest = &rest[end..];
        } else if ch == '\'' || ch == '"' {
            let end = string_end(rest, ch);
            tokens.push(Token::new(TokenKind::String, &rest[..end]));
            rest = &rest[end..];
            command_position = false;
        } else if ch == '\n' {
            push_text(&mut tokens, ch);
            rest = &rest[1..];
            command_position = true;
        } else if "|&;".contains(ch) {
            let end = rest.find(|c: char| !"|&;".contains(c)).unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Operator, &rest[..end]));
            rest = &rest[end..];
            command_position = true;
        } else if ch == '=' {
            tokens.push(Token::new(TokenKind::Operator, "="));
            rest = &rest[1..];
            command_position = false;
        } else if ch.is_ascii_digit() && command_position {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Number, &rest[..end]));
            rest = &rest[end..];
        } else if ch.is_ascii_alphanumeric() || "_./-$".contains(ch) {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || "_./-$:@".contains(c)))
                .unwrap_or(rest.len());
            let word = &rest[..end];
            let kind = if SHELL_KEYWORDS.contains(&word) {
                TokenKind::Keyword
            } else if command_position && !word.starts_with('-') {
                TokenKind::Function
            } else {
                TokenKind::Ident
            };
            if kind == TokenKind::Function {
                command_position = false;
            }
            tokens.push(Token::new(kind, word));
            rest = &rest[end..];
        } else {
            push_text(&mut tokens, ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    tokens
}

/// Scans CSS source. Identifiers in declaration position (between `{`
/// or `;` and a `:`) become `property` tokens.
fn scan_css(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut in_block = false;
    let mut at_declaration = false;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Comment, &rest[..end]));
            rest = &rest[end..];
        } else if ch == '\'' || ch == '"' {
            let end = string_end(rest, ch);
            tokens.push(Token::new(TokenKind::String, &rest[..end]));
            rest = &rest[end..];
        } else if ch == '{' {
            in_block = true;
            at_declaration = true;
            tokens.push(Token::new(TokenKind::Punctuation, "{"));
            rest = &rest[1..];
        } else if ch == '}' {
            in_block = false;
            at_declaration = false;
            tokens.push(Token::new(TokenKind::Punctuation, "}"));
            rest = &rest[1..];
        } else if ch == ';' {
            at_declaration = in_block;
            tokens.push(Token::new(TokenKind::Punctuation, ";"));
            rest = &rest[1..];
        } else if ch == ':' {
            at_declaration = false;
            tokens.push(Token::new(TokenKind::Punctuation, ":"));
            rest = &rest[1..];
        } else if ch == '@' {
            let end = rest[1..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                .map(|i| i + 1)
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Keyword, &rest[..end]));
            rest = &rest[end..];
        } else if ch.is_ascii_digit()
            || (ch == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit()))
        {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '%'))
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Number, &rest[..end]));
            rest = &rest[end..];
        } else if ch.is_ascii_alphabetic() || ch == '-' || ch == '_' {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                .unwrap_or(rest.len());
            let kind = if in_block && at_declaration {
                TokenKind::Property
            } else {
                TokenKind::Ident
            };
            tokens.push(Token::new(kind, &rest[..end]));
            rest = &rest[end..];
        } else {
            push_text(&mut tokens, ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    tokens
}

/// Scans HTML-style markup. With `svelte` set, `<script>`/`<style>`
/// regions and `{...}` template expressions delegate to the script and
/// CSS scanners.
fn scan_markup(source: &str, svelte: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("<!--") {
            let end = rest[4..].find("-->").map(|i| i + 7).unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Comment, &rest[..end]));
            rest = &rest[end..];
        } else if rest.starts_with("<!") {
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::Text, &rest[..end]));
            rest = &rest[end..];
        } else if ch == '<' {
            let consumed = scan_tag(rest, &mut tokens, svelte);
            rest = &rest[consumed..];
        } else if svelte && ch == '{' {
            let consumed = scan_template_expression(rest, &mut tokens);
            rest = &rest[consumed..];
        } else {
            push_text(&mut tokens, ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    tokens
}

/// Scans one tag starting at `<`; returns bytes consumed. For opening
/// `script`/`style` tags the raw content region up to the matching
/// closing tag is delegated to the matching scanner.
fn scan_tag(rest: &str, tokens: &mut Vec<Token>, svelte: bool) -> usize {
    let closing = rest.starts_with("</");
    let mut pos = if closing { 2 } else { 1 };
    tokens.push(Token::new(
        TokenKind::Punctuation,
        if closing { "</" } else { "<" },
    ));

    let name_end = rest[pos..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .map(|i| pos + i)
        .unwrap_or(rest.len());
    let name = rest[pos..name_end].to_string();
    if !name.is_empty() {
        tokens.push(Token::new(TokenKind::Tag, &name));
    }
    pos = name_end;

    // Attribute region until `>` or `/>`.
    loop {
        let Some(ch) = rest[pos..].chars().next() else {
            return rest.len();
        };
        if ch == '>' {
            tokens.push(Token::new(TokenKind::Punctuation, ">"));
            pos += 1;
            break;
        } else if rest[pos..].starts_with("/>") {
            tokens.push(Token::new(TokenKind::Punctuation, "/>"));
            pos += 2;
            return pos;
        } else if ch == '"' || ch == '\'' {
            let end = pos + string_end(&rest[pos..], ch);
            tokens.push(Token::new(TokenKind::AttrValue, &rest[pos..end]));
            pos = end;
        } else if svelte && ch == '{' {
            pos += scan_template_expression(&rest[pos..], tokens);
        } else if ch == '=' {
            tokens.push(Token::new(TokenKind::Punctuation, "="));
            pos += 1;
        } else if ch.is_ascii_alphabetic() || "_:-".contains(ch) {
            let end = rest[pos..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || "_:-".contains(c)))
                .map(|i| pos + i)
                .unwrap_or(rest.len());
            tokens.push(Token::new(TokenKind::AttrName, &rest[pos..end]));
            pos = end;
        } else {
            push_text(tokens, ch);
            pos += ch.len_utf8();
        }
    }

    if closing {
        return pos;
    }

    // Raw content regions: hand script/style bodies to their scanners.
    let lowered = name.to_ascii_lowercase();
    let close_tag = match lowered.as_str() {
        "script" => "</script",
        "style" => "</style",
        _ => return pos,
    };
    let body_end = rest[pos..]
        .find(close_tag)
        .map(|i| pos + i)
        .unwrap_or(rest.len());
    let body = &rest[pos..body_end];
    if lowered == "script" {
        tokens.extend(scan_script(body));
    } else {
        tokens.extend(scan_css(body));
    }
    body_end
}

/// Scans a `{...}` template expression; returns bytes consumed. Block
/// openers like `{#if` and `{:else}` classify the leading word as a
/// keyword, the rest is scanned as script.
fn scan_template_expression(rest: &str, tokens: &mut Vec<Token>) -> usize {
    tokens.push(Token::new(TokenKind::Punctuation, "{"));
    let (mut inner, consumed, closed) = match balanced_brace_end(rest) {
        Some(end) => (&rest[1..end - 1], end, true),
        None => (&rest[1..], rest.len(), false),
    };

    if let Some(marker) = inner.chars().next().filter(|c| "#/:@".contains(*c)) {
        let end = inner[marker.len_utf8()..]
            .find(|c: char| !c.is_ascii_alphanumeric())
            .map(|i| i + marker.len_utf8())
            .unwrap_or(inner.len());
        tokens.push(Token::new(TokenKind::Keyword, &inner[..end]));
        inner = &inner[end..];
    }
    tokens.extend(scan_script(inner));

    if closed {
        tokens.push(Token::new(TokenKind::Punctuation, "}"));
    }
    consumed
}

/// Index just past the `}` matching the `{` at byte 0, skipping over
/// string literals. `None` when unbalanced.
fn balanced_brace_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = 0usize;
    while let Some(ch) = rest[pos..].chars().next() {
        match ch {
            '{' => {
                depth += 1;
                pos += 1;
            }
            '}' => {
                depth -= 1;
                pos += 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            '\'' | '"' | '`' => pos += string_end(&rest[pos..], ch),
            _ => pos += ch.len_utf8(),
        }
    }
    None
}
