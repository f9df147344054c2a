//! Rewrites standalone type names in rendered fragments into anchor
//! links pointing at the generated type listings.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use skeindocs_core::slugify;

use crate::error::DocsError;
use crate::manifest::Module;

/// Import qualifier that may precede a type name in snippet text, in
/// both raw and attribute-escaped quote forms.
const QUALIFIER: &str = r"(import\((?:'|&apos;)@skein/kit(?:'|&apos;)\)\.)?";

static COMMENT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="token comment(?: wrapped)?"[^>]*>([\s\S]*?)</span>"#)
        .expect("comment span pattern is valid")
});

/// Where a fragment is eligible for link rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// All text outside markup tags.
    Everywhere,
    /// Only the content of highlighted comment tokens.
    Comments,
}

/// Registry of linkable type names, built once from the manifest.
#[derive(Debug)]
pub struct TypeLinks {
    pattern: Option<Regex>,
    anchors: HashMap<String, String>,
}

impl TypeLinks {
    /// Registers an anchor for every module type. Exports are listed in
    /// the docs but never linkified.
    pub fn from_modules(modules: &[Module]) -> Result<Self, DocsError> {
        let mut anchors = HashMap::new();
        let mut names = Vec::new();

        for module in modules {
            let module_slug = slugify(&module.name);
            for ty in &module.types {
                anchors.insert(
                    ty.name.clone(),
                    format!("#{}-{}", module_slug, slugify(&ty.name)),
                );
                names.push(regex::escape(&ty.name));
            }
        }

        let pattern = if names.is_empty() {
            None
        } else {
            let source = format!(r"{QUALIFIER}\b({})\b", names.join("|"));
            Some(Regex::new(&source).map_err(|err| {
                DocsError::Internal(format!("type link pattern failed to build: {err}"))
            })?)
        };

        Ok(Self { pattern, anchors })
    }

    /// The anchor registered for `name`, if any.
    pub fn anchor(&self, name: &str) -> Option<&str> {
        self.anchors.get(name).map(String::as_str)
    }

    /// Rewrites known type names in `html` into anchor links.
    ///
    /// `current` is the type being documented right now; occurrences of
    /// it stay plain so a declaration never links to its own heading.
    /// `suppress` disables rewriting wholesale (the snippet's
    /// `link: false` option). An `import('@skein/kit').` qualifier in
    /// front of a name is kept as-is with only the name linkified.
    /// Markup tags are never touched; with [`LinkScope::Comments`] only
    /// highlighted comment content is eligible.
    pub fn link_types(
        &self,
        html: &str,
        current: Option<&str>,
        suppress: bool,
        scope: LinkScope,
    ) -> String {
        if self.pattern.is_none() {
            return html.to_string();
        }

        match scope {
            LinkScope::Everywhere => self.rewrite_outside_tags(html, current, suppress),
            LinkScope::Comments => {
                let mut out = String::with_capacity(html.len());
                let mut last = 0usize;
                for caps in COMMENT_SPAN.captures_iter(html) {
                    let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                        continue;
                    };
                    out.push_str(&html[last..inner.start()]);
                    out.push_str(&self.rewrite_text(inner.as_str(), current, suppress));
                    out.push_str(&html[inner.end()..whole.end()]);
                    last = whole.end();
                }
                out.push_str(&html[last..]);
                out
            }
        }
    }

    fn rewrite_outside_tags(&self, html: &str, current: Option<&str>, suppress: bool) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;

        while let Some(open) = rest.find('<') {
            out.push_str(&self.rewrite_text(&rest[..open], current, suppress));
            match rest[open..].find('>') {
                Some(close) => {
                    out.push_str(&rest[open..open + close + 1]);
                    rest = &rest[open + close + 1..];
                }
                None => {
                    // Unterminated tag; emit the remainder untouched.
                    out.push_str(&rest[open..]);
                    return out;
                }
            }
        }
        out.push_str(&self.rewrite_text(rest, current, suppress));
        out
    }

    fn rewrite_text(&self, text: &str, current: Option<&str>, suppress: bool) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        pattern
            .replace_all(text, |caps: &Captures| {
                let qualifier = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let name = &caps[2];
                if suppress || current == Some(name) {
                    return caps[0].to_string();
                }
                match self.anchors.get(name) {
                    Some(anchor) => format!("{qualifier}<a href=\"{anchor}\">{name}</a>"),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_modules;

    fn links() -> TypeLinks {
        let modules = load_modules(
            r#"[
                {
                    "name": "@skein/kit",
                    "types": [
                        { "name": "Config" },
                        { "name": "Action" },
                        { "name": "Actions" }
                    ],
                    "exports": [{ "name": "error" }]
                }
            ]"#,
        )
        .expect("manifest should parse");
        TypeLinks::from_modules(&modules).expect("links should build")
    }

    #[test]
    fn plain_occurrence_links() {
        let links = links();
        assert_eq!(
            links.link_types("see Config for details", None, false, LinkScope::Everywhere),
            "see <a href=\"#skein-kit-config\">Config</a> for details"
        );
    }

    #[test]
    fn current_type_does_not_self_link() {
        let links = links();
        assert_eq!(
            links.link_types("Config is here", Some("Config"), false, LinkScope::Everywhere),
            "Config is here"
        );
    }

    #[test]
    fn suppression_flag_disables_everything() {
        let links = links();
        assert_eq!(
            links.link_types("Config", None, true, LinkScope::Everywhere),
            "Config"
        );
    }

    #[test]
    fn qualifier_is_preserved_outside_the_link() {
        let links = links();
        let out = links.link_types(
            "type A = import('@skein/kit').Config;",
            None,
            false,
            LinkScope::Everywhere,
        );
        assert_eq!(
            out,
            "type A = import('@skein/kit').<a href=\"#skein-kit-config\">Config</a>;"
        );

        let escaped = links.link_types(
            "import(&apos;@skein/kit&apos;).Config",
            None,
            false,
            LinkScope::Everywhere,
        );
        assert_eq!(
            escaped,
            "import(&apos;@skein/kit&apos;).<a href=\"#skein-kit-config\">Config</a>"
        );
    }

    #[test]
    fn longer_name_wins_at_word_boundaries() {
        let links = links();
        let out = links.link_types("Actions", None, false, LinkScope::Everywhere);
        assert_eq!(out, "<a href=\"#skein-kit-actions\">Actions</a>");
    }

    #[test]
    fn identifiers_containing_a_name_are_left_alone() {
        let links = links();
        assert_eq!(
            links.link_types("PageConfig Configs", None, false, LinkScope::Everywhere),
            "PageConfig Configs"
        );
    }

    #[test]
    fn exports_are_not_linkified() {
        let links = links();
        assert_eq!(
            links.link_types("call error(404)", None, false, LinkScope::Everywhere),
            "call error(404)"
        );
    }

    #[test]
    fn attribute_regions_are_never_rewritten() {
        let links = links();
        let html = "<span title=\"Config\">Config</span>";
        assert_eq!(
            links.link_types(html, None, false, LinkScope::Everywhere),
            "<span title=\"Config\"><a href=\"#skein-kit-config\">Config</a></span>"
        );
    }

    #[test]
    fn comment_scope_only_touches_comment_tokens() {
        let links = links();
        let html = concat!(
            "<span class=\"token keyword\">Config</span>",
            "<span class=\"token comment\">/** a Config */</span>"
        );
        let out = links.link_types(html, None, false, LinkScope::Comments);
        assert_eq!(
            out,
            concat!(
                "<span class=\"token keyword\">Config</span>",
                "<span class=\"token comment\">/** a <a href=\"#skein-kit-config\">Config</a> */</span>"
            )
        );
    }
}
