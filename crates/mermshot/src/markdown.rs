//! Mermaid fences inside Markdown documents.

use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Opening line of a fenced block: the delimiter run and the info word after it.
static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\S\r\n]*(`{3,}|~{3,}|:{3,})[^\S\r\n]*([^\s`]*)(.*)$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MermaidBlock {
    /// Byte range of the whole fence, delimiters included.
    pub range: Range<usize>,
    pub definition: String,
}

/// Image that replaces a rendered block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownImage {
    pub url: String,
    pub title: Option<String>,
    pub desc: Option<String>,
}

#[derive(Clone, Copy)]
enum Fence<'a> {
    /// Inside a ```` ```mermaid ```` or `:::mermaid` block; closed only by the same delimiter.
    Mermaid {
        delimiter: &'a str,
        start: usize,
        body_start: usize,
    },
    /// Inside some other code fence; Mermaid fences shown in it are left alone.
    Other { marker: char, len: usize },
}

/// Each ```` ```mermaid ```` or `:::mermaid` block, closed by a line holding the same delimiter.
/// Unterminated blocks are skipped.
pub fn find_diagrams(markdown: &str) -> Vec<MermaidBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<Fence<'_>> = None;
    let mut offset = 0usize;

    for raw in markdown.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);

        match open {
            None => open = opening_fence(line, line_start, offset),
            Some(Fence::Mermaid {
                delimiter,
                start,
                body_start,
            }) => {
                if line.trim() == delimiter {
                    blocks.push(MermaidBlock {
                        range: start..line_start + line.len(),
                        definition: markdown[body_start..line_start].to_string(),
                    });
                    open = None;
                }
            }
            Some(Fence::Other { marker, len }) => {
                let closing = line.trim();
                if closing.len() >= len && closing.chars().all(|c| c == marker) {
                    open = None;
                }
            }
        }
    }
    blocks
}

fn opening_fence(line: &str, line_start: usize, next_line: usize) -> Option<Fence<'_>> {
    let caps = FENCE_OPEN.captures(line)?;
    let delimiter = caps.get(1)?.as_str();
    let info = caps.get(2).map_or("", |m| m.as_str());
    let rest = caps.get(3).map_or("", |m| m.as_str());

    if delimiter.len() == 3 && info == "mermaid" && rest.trim().is_empty() {
        return Some(Fence::Mermaid {
            delimiter,
            start: line_start,
            body_start: next_line,
        });
    }
    let marker = delimiter.chars().next()?;
    // `:::` containers hold ordinary Markdown, so only code fences hide their content.
    (marker != ':').then_some(Fence::Other {
        marker,
        len: delimiter.len(),
    })
}

/// Replaces every block with its image; `images[i]` belongs to `blocks[i]`.
pub fn replace_diagrams(
    markdown: &str,
    blocks: &[MermaidBlock],
    images: &[MarkdownImage],
) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0usize;
    for (block, image) in blocks.iter().zip(images) {
        out.push_str(&markdown[cursor..block.range.start]);
        out.push_str(&markdown_image(image));
        cursor = block.range.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

fn markdown_image(image: &MarkdownImage) -> String {
    let alt = escape_with(image.title.as_deref().unwrap_or("diagram"), &['[', ']', '\\']);
    let url = escape_with(&image.url, &['(', ')', '\\']);
    match image.desc.as_deref() {
        Some(desc) => {
            let desc = escape_with(desc, &['"', '\\']);
            format!(r#"![{alt}]({url} "{desc}")"#)
        }
        None => format!("![{alt}]({url})"),
    }
}

fn escape_with(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `<dir>/<stem>-<n>.<ext>` for the n-th (1-based) diagram of `output`.
pub fn image_path(output: &Path, n: usize, ext: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    output.with_file_name(format!("{stem}-{n}.{ext}"))
}

/// Link to `image` as written from a Markdown file in the same directory.
pub fn relative_image_url(image: &Path) -> String {
    let name = image
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("./{name}")
}
