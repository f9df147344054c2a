//! Markdown rendering for docs pages.
//!
//! A single mdast walk emits the page HTML while collecting the
//! section tree. Headings drive a path-based slug scheme (an h4 slug
//! is prefixed with its h3 slug), fenced code defers to the snippet
//! renderer, and inline code gets type links.

use markdown::mdast::{self, Node};
use markdown::message::{Message, Place};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use skeindocs_core::{SourceLocation, slugify};

use crate::error::DocsError;
use crate::highlight::push_escaped;
use crate::linker::LinkScope;
use crate::renderer::{RenderContext, render_code_block};

static CODE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?code>").expect("valid regex"));

/// A level-3 heading with its nested level-4 entries.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    /// Plain heading text.
    pub title: String,
    /// Anchor slug, unique within the page.
    pub slug: String,
    /// Level-4 headings under this section.
    pub subsections: Vec<Subsection>,
}

/// A level-4 heading inside a [`Section`].
#[derive(Debug, Clone, Serialize)]
pub struct Subsection {
    /// Plain heading text.
    pub title: String,
    /// Anchor slug, prefixed with the parent section's slug.
    pub slug: String,
}

/// Rendered page body plus its section tree.
#[derive(Debug)]
pub(crate) struct RenderedPage {
    pub(crate) html: String,
    pub(crate) sections: Vec<Section>,
}

/// Renders a page body to HTML.
pub(crate) fn render_page(body: &str, ctx: &RenderContext<'_>) -> Result<RenderedPage, DocsError> {
    let tree = markdown::to_mdast(body, &markdown::ParseOptions::gfm())
        .map_err(|message| markdown_error(&message))?;

    let mut context = Context {
        render: ctx,
        out: String::with_capacity(body.len() * 2),
        path: Vec::new(),
        current: String::new(),
        sections: Vec::new(),
        tight: Vec::new(),
    };
    context.render_node(&tree)?;

    Ok(RenderedPage {
        html: context.out,
        sections: context.sections,
    })
}

fn markdown_error(message: &Message) -> DocsError {
    DocsError::Markdown {
        message: message.to_string(),
        location: message_location(message),
    }
}

fn message_location(message: &Message) -> SourceLocation {
    match &message.place {
        Some(place) => match place.as_ref() {
            Place::Point(point) => SourceLocation::new(point.line, point.column),
            Place::Position(position) => {
                SourceLocation::new(position.start.line, position.start.column)
            }
        },
        None => SourceLocation::new(1, 1),
    }
}

struct Context<'a> {
    render: &'a RenderContext<'a>,
    out: String,
    /// Slug path per heading level, index `level - 1`.
    path: Vec<String>,
    /// Innermost heading title, the linker context for snippets.
    current: String,
    sections: Vec<Section>,
    /// Tightness of each open list, innermost last.
    tight: Vec<bool>,
}

impl Context<'_> {
    fn render_node(&mut self, node: &Node) -> Result<(), DocsError> {
        match node {
            Node::Root(root) => self.render_children(&root.children),
            Node::Text(text) => {
                self.push_text(&text.value);
                Ok(())
            }
            Node::Paragraph(paragraph) => self.render_paragraph(paragraph),
            Node::Heading(heading) => self.render_heading(heading),
            Node::Code(code) => self.render_code(code),
            Node::InlineCode(code) => {
                self.render_codespan(&code.value);
                Ok(())
            }
            Node::Strong(strong) => self.render_wrapped("strong", &strong.children),
            Node::Emphasis(emphasis) => self.render_wrapped("em", &emphasis.children),
            Node::Delete(delete) => self.render_wrapped("del", &delete.children),
            Node::Blockquote(quote) => self.render_wrapped("blockquote", &quote.children),
            Node::Link(link) => self.render_link(link),
            Node::Image(image) => {
                self.render_image(image);
                Ok(())
            }
            Node::List(list) => self.render_list(list),
            Node::ListItem(item) => {
                self.out.push_str("<li>");
                self.render_children(&item.children)?;
                self.out.push_str("</li>");
                Ok(())
            }
            Node::Table(table) => self.render_table(table),
            Node::TableRow(_) | Node::TableCell(_) => Ok(()),
            Node::Html(html) => {
                self.out.push_str(&html.value);
                Ok(())
            }
            Node::Break(_) => {
                self.out.push_str("<br />");
                Ok(())
            }
            Node::ThematicBreak(_) => {
                self.out.push_str("<hr />");
                Ok(())
            }
            _ => {
                log::warn!("unhandled markdown node in {}: {:?}", self.render.file, node);
                Ok(())
            }
        }
    }

    fn render_children(&mut self, children: &[Node]) -> Result<(), DocsError> {
        for child in children {
            self.render_node(child)?;
        }
        Ok(())
    }

    /// Headings maintain the slug path and the section tree. Only h3
    /// and h4 are legal inside a page body; the page title comes from
    /// front matter.
    fn render_heading(&mut self, heading: &mdast::Heading) -> Result<(), DocsError> {
        let saved = std::mem::take(&mut self.out);
        self.render_children(&heading.children)?;
        let inner = std::mem::replace(&mut self.out, saved);

        let title = CODE_TAGS
            .replace_all(&inner, "")
            .replace("&quot;", "\"")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
        self.current = title.clone();

        let level = heading.depth as usize;
        if self.path.len() < level {
            self.path.resize(level, String::new());
        }
        self.path[level - 1] = slugify(&title);
        self.path.truncate(level);
        let slug = self
            .path
            .iter()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("-");

        match heading.depth {
            3 => self.sections.push(Section {
                title: title.clone(),
                slug: slug.clone(),
                subsections: Vec::new(),
            }),
            4 => {
                let Some(section) = self.sections.last_mut() else {
                    return Err(self.unexpected_heading(heading.depth));
                };
                section.subsections.push(Subsection {
                    title: title.clone(),
                    slug: slug.clone(),
                });
            }
            _ => return Err(self.unexpected_heading(heading.depth)),
        }

        self.out.push_str(&format!(
            "<h{level} id=\"{slug}\">{inner}<a href=\"#{slug}\" class=\"anchor\"><span class=\"visually-hidden\">permalink</span></a></h{level}>"
        ));
        Ok(())
    }

    fn unexpected_heading(&self, level: u8) -> DocsError {
        DocsError::UnexpectedHeading {
            level,
            file: self.render.file.to_string(),
        }
    }

    fn render_code(&mut self, code: &mdast::Code) -> Result<(), DocsError> {
        let language = code.lang.as_deref().unwrap_or("");
        let html = render_code_block(&code.value, language, &self.current, self.render)?;
        self.out.push_str(&html);
        Ok(())
    }

    /// Inline code links type names without the self-suppression the
    /// block renderer applies.
    fn render_codespan(&mut self, value: &str) {
        let mut escaped = String::new();
        push_escaped(&mut escaped, value);
        let linked = self
            .render
            .links
            .link_types(&escaped, None, false, LinkScope::Everywhere);
        self.out.push_str("<code>");
        self.out.push_str(&linked);
        self.out.push_str("</code>");
    }

    fn render_paragraph(&mut self, paragraph: &mdast::Paragraph) -> Result<(), DocsError> {
        let tight = self.tight.last().copied().unwrap_or(false);
        if !tight {
            self.out.push_str("<p>");
        }
        self.render_children(&paragraph.children)?;
        if !tight {
            self.out.push_str("</p>");
        }
        Ok(())
    }

    fn render_list(&mut self, list: &mdast::List) -> Result<(), DocsError> {
        let tag = if list.ordered { "ol" } else { "ul" };
        self.out.push_str(&format!("<{tag}>"));
        self.tight.push(!list.spread);
        for child in &list.children {
            self.render_node(child)?;
        }
        self.tight.pop();
        self.out.push_str(&format!("</{tag}>"));
        Ok(())
    }

    fn render_link(&mut self, link: &mdast::Link) -> Result<(), DocsError> {
        self.out.push_str("<a href=\"");
        self.push_attr_value(&link.url);
        self.out.push('"');
        if let Some(title) = &link.title {
            self.out.push_str(" title=\"");
            self.push_attr_value(title);
            self.out.push('"');
        }
        self.out.push('>');
        self.render_children(&link.children)?;
        self.out.push_str("</a>");
        Ok(())
    }

    fn render_image(&mut self, image: &mdast::Image) {
        self.out.push_str("<img src=\"");
        self.push_attr_value(&image.url);
        self.out.push('"');
        self.out.push_str(" alt=\"");
        self.push_attr_value(&image.alt);
        self.out.push('"');
        if let Some(title) = &image.title {
            self.out.push_str(" title=\"");
            self.push_attr_value(title);
            self.out.push('"');
        }
        self.out.push_str(" />");
    }

    fn render_table(&mut self, table: &mdast::Table) -> Result<(), DocsError> {
        self.out.push_str("<table><thead>");
        if let Some(Node::TableRow(row)) = table.children.first() {
            self.render_table_row(row, true, &table.align)?;
        }
        self.out.push_str("</thead>");
        if table.children.len() > 1 {
            self.out.push_str("<tbody>");
            for child in table.children.iter().skip(1) {
                if let Node::TableRow(row) = child {
                    self.render_table_row(row, false, &table.align)?;
                }
            }
            self.out.push_str("</tbody>");
        }
        self.out.push_str("</table>");
        Ok(())
    }

    fn render_table_row(
        &mut self,
        row: &mdast::TableRow,
        header: bool,
        aligns: &[mdast::AlignKind],
    ) -> Result<(), DocsError> {
        self.out.push_str("<tr>");
        for (index, cell) in row.children.iter().enumerate() {
            let Node::TableCell(cell) = cell else { continue };
            let tag = if header { "th" } else { "td" };
            let align = match aligns.get(index) {
                Some(mdast::AlignKind::Left) => " align=\"left\"",
                Some(mdast::AlignKind::Right) => " align=\"right\"",
                Some(mdast::AlignKind::Center) => " align=\"center\"",
                _ => "",
            };
            self.out.push_str(&format!("<{tag}{align}>"));
            self.render_children(&cell.children)?;
            self.out.push_str(&format!("</{tag}>"));
        }
        self.out.push_str("</tr>");
        Ok(())
    }

    fn render_wrapped(&mut self, tag: &str, children: &[Node]) -> Result<(), DocsError> {
        self.out.push_str(&format!("<{tag}>"));
        self.render_children(children)?;
        self.out.push_str(&format!("</{tag}>"));
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        push_escaped(&mut self.out, text);
    }

    fn push_attr_value(&mut self, value: &str) {
        for c in value.chars() {
            match c {
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '&' => self.out.push_str("&amp;"),
                '"' => self.out.push_str("&quot;"),
                _ => self.out.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;
    use crate::cache::SnippetCache;
    use crate::linker::TypeLinks;
    use crate::manifest::load_modules;

    const MANIFEST: &str = r#"[
        {
            "name": "@skein/kit",
            "comment": "",
            "types": [{ "name": "Config", "comment": "", "snippet": "interface Config {}" }],
            "exports": [{ "name": "error", "comment": "", "snippet": "function error(status: number): never;" }]
        }
    ]"#;

    struct Fixture {
        _dir: TempDir,
        cache: SnippetCache,
        links: TypeLinks,
        hovers: HashMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let cache = SnippetCache::new(dir.path());
            let modules = load_modules(MANIFEST).expect("manifest parses");
            let links = TypeLinks::from_modules(&modules).expect("links build");
            Fixture {
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
                file: "10-load.md",
            }
        }
    }

    #[test]
    fn sections_nest_h4_under_h3_with_prefixed_slugs() {
        let fixture = Fixture::new();
        let body = "### Loading data\n\nIntro.\n\n#### Errors\n\nDetails.\n\n### Hooks\n\nMore.\n";
        let page = render_page(body, &fixture.ctx()).expect("renders");

        assert_eq!(page.sections.len(), 2);
        assert_eq!(page.sections[0].title, "Loading data");
        assert_eq!(page.sections[0].slug, "loading-data");
        assert_eq!(page.sections[0].subsections.len(), 1);
        assert_eq!(page.sections[0].subsections[0].title, "Errors");
        assert_eq!(page.sections[0].subsections[0].slug, "loading-data-errors");
        assert_eq!(page.sections[1].slug, "hooks");
        assert!(page.sections[1].subsections.is_empty());
    }

    #[test]
    fn headings_carry_id_and_anchor() {
        let fixture = Fixture::new();
        let page = render_page("### Hooks\n", &fixture.ctx()).expect("renders");
        assert!(page.html.contains(
            "<h3 id=\"hooks\">Hooks<a href=\"#hooks\" class=\"anchor\"><span class=\"visually-hidden\">permalink</span></a></h3>"
        ));
    }

    #[test]
    fn heading_level_outside_body_range_is_fatal() {
        let fixture = Fixture::new();
        let result = render_page("## Top level\n", &fixture.ctx());
        match result {
            Err(DocsError::UnexpectedHeading { level, file }) => {
                assert_eq!(level, 2);
                assert_eq!(file, "10-load.md");
            }
            other => panic!("expected UnexpectedHeading, got {other:?}"),
        }
    }

    #[test]
    fn subsection_before_any_section_is_fatal() {
        let fixture = Fixture::new();
        let result = render_page("#### Orphan\n", &fixture.ctx());
        assert!(matches!(
            result,
            Err(DocsError::UnexpectedHeading { level: 4, .. })
        ));
    }

    #[test]
    fn code_heading_titles_lose_tags_and_entities() {
        let fixture = Fixture::new();
        let page = render_page("### `Promise<T>`\n", &fixture.ctx()).expect("renders");
        assert_eq!(page.sections[0].title, "Promise<T>");
        assert_eq!(page.sections[0].slug, "promise-t");
        assert!(
            page.html
                .contains("<h3 id=\"promise-t\"><code>Promise&lt;T&gt;</code>")
        );
    }

    #[test]
    fn inline_code_links_known_types() {
        let fixture = Fixture::new();
        let page =
            render_page("### Intro\n\nSee `Config` for details.\n", &fixture.ctx()).expect("renders");
        assert!(
            page.html
                .contains("<code><a href=\"#skein-kit-config\">Config</a></code>")
        );
    }

    #[test]
    fn paragraphs_emphasis_and_tight_lists_render() {
        let fixture = Fixture::new();
        let body = "### Basics\n\nHello *world*.\n\n- one\n- two\n";
        let page = render_page(body, &fixture.ctx()).expect("renders");
        assert!(page.html.contains("<p>Hello <em>world</em>.</p>"));
        assert!(page.html.contains("<ul><li>one</li><li>two</li></ul>"));
    }

    #[test]
    fn fenced_blocks_render_under_their_section() {
        let fixture = Fixture::new();
        let body = "### Styling\n\n```css\na {\n    color: red;\n}\n```\n";
        let page = render_page(body, &fixture.ctx()).expect("renders");
        assert!(page.html.contains("<div class=\"code-block\">"));
        assert!(page.html.contains("language-css"));
    }

    #[test]
    fn raw_html_passes_through() {
        let fixture = Fixture::new();
        let body = "### Media\n\n<video src=\"demo.mp4\"></video>\n";
        let page = render_page(body, &fixture.ctx()).expect("renders");
        assert!(page.html.contains("<video src=\"demo.mp4\"></video>"));
    }

    #[test]
    fn tables_split_head_and_body_with_alignment() {
        let fixture = Fixture::new();
        let body = "### Matrix\n\n| a | b |\n| :-- | --: |\n| 1 | 2 |\n";
        let page = render_page(body, &fixture.ctx()).expect("renders");
        assert!(page.html.contains("<thead><tr><th align=\"left\">a</th>"));
        assert!(page.html.contains("<tbody><tr><td align=\"left\">1</td>"));
        assert!(page.html.contains("<td align=\"right\">2</td>"));
    }

    #[test]
    fn blockquotes_wrap_their_children() {
        let fixture = Fixture::new();
        let page = render_page("### Note\n\n> Careful now.\n", &fixture.ctx()).expect("renders");
        assert!(page.html.contains("<blockquote><p>Careful now.</p></blockquote>"));
    }
}
