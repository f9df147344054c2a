/// Turns heading text into a lowercase, URL-safe anchor token.
///
/// Escaped angle brackets (`&lt;` / `&gt;`) are removed outright, so
/// `&lt;form&gt;` slugs to `form` rather than picking up dashes. Every
/// remaining character outside `[a-z0-9-$]` becomes a dash, runs of
/// dashes collapse, and leading/trailing dashes are trimmed. `$`
/// survives so module names like `$app/navigation` keep their prefix.
///
/// Stable across runs and idempotent: the slug of a slug is itself.
///
/// # Examples
///
/// ```
/// use skeindocs_core::slug::slugify;
///
/// assert_eq!(slugify("$app/navigation"), "$app-navigation");
/// assert_eq!(slugify("Making fetch requests"), "making-fetch-requests");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut rest = lowered.as_str();
    while !rest.is_empty() {
        if let Some(stripped) = rest
            .strip_prefix("&lt;")
            .or_else(|| rest.strip_prefix("&gt;"))
        {
            rest = stripped;
            continue;
        }
        let mut chars = rest.chars();
        let Some(ch) = chars.next() else { break };
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '$' {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            // Literal dashes route through here too, collapsing runs.
            slug.push('-');
        }
        rest = chars.as_str();
    }

    let trimmed = slug.trim_matches('-');
    if trimmed.len() == slug.len() {
        slug
    } else {
        trimmed.to_string()
    }
}
