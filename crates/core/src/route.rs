/// Parameter names declared by a route id.
///
/// Recognizes `[name]`, optional `[[name]]`, rest `[...name]`, and
/// matcher-qualified `[name=matcher]` segments anywhere in the id.
/// Unclosed brackets terminate the scan with what was collected.
///
/// ```
/// use skeindocs_core::route::route_params;
///
/// assert_eq!(route_params("blog/[slug]"), vec!["slug"]);
/// assert_eq!(route_params("files/[...path]"), vec!["path"]);
/// assert_eq!(route_params("[[lang]]/about"), vec!["lang"]);
/// ```
pub fn route_params(route_id: &str) -> Vec<String> {
    let bytes = route_id.as_bytes();
    let mut names = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }

        let doubled = bytes.get(i + 1) == Some(&b'[');
        let inner_start = if doubled { i + 2 } else { i + 1 };
        let Some(rel_close) = route_id[inner_start..].find(']') else {
            break;
        };
        let inner = &route_id[inner_start..inner_start + rel_close];

        let name = inner.strip_prefix("...").unwrap_or(inner);
        let name = name.split_once('=').map_or(name, |(head, _)| head);
        if !name.is_empty() {
            names.push(name.to_string());
        }

        i = inner_start + rel_close + 1;
        if doubled && bytes.get(i) == Some(&b']') {
            i += 1;
        }
    }

    names
}
