//! Accessibility metadata and id handling for rendered SVG markup.

/// `<title>`/`<desc>` text found on the root `<svg>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvgMetadata {
    pub title: Option<String>,
    pub desc: Option<String>,
}

/// Parses the serialized SVG and pulls out its accessibility metadata.
///
/// SVG requires `<title>` to be the first child of its parent, so the title is taken from the
/// root's first child node only, and only if that node is a `<title>` element. Any other leading
/// node (whitespace text included) means there is no title. The description is the first
/// `<desc>` element among the root's children.
///
/// Fails if the markup is not well-formed XML.
pub fn extract_metadata(svg: &str) -> crate::Result<SvgMetadata> {
    let doc = roxmltree::Document::parse(svg)?;
    let root = doc.root_element();

    let title = root
        .first_child()
        .filter(|n| n.is_element() && n.tag_name().name() == "title")
        .map(text_content);
    let desc = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "desc")
        .map(text_content);

    Ok(SvgMetadata { title, desc })
}

fn text_content(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Converts an arbitrary string into a conservative SVG `id` token.
///
/// Mermaid uses the root `<svg id="...">` value as a prefix for internal ids like
/// `chart-title-<id>` and marker ids under `<defs>`, and it is also passed to `document.getElementById`
/// inside the page.
///
/// This helper:
/// - trims whitespace
/// - replaces unsupported characters with `-`
/// - ensures the id starts with an ASCII letter by prefixing `m-` when needed
pub fn sanitize_svg_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "m-untitled".to_string();
    }

    let mut out = String::with_capacity(raw.len() + 4);
    for ch in raw.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == ':' || ch == '.';
        out.push(if ok { ch } else { '-' });
    }

    let starts_ok = out.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_ok {
        out.insert_str(0, "m-");
    }

    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let out = out.trim_matches('-');
    if out.is_empty() || out == "m" {
        return "m-untitled".to_string();
    }
    out.to_string()
}
