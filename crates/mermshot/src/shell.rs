//! The static HTML page every render navigates to.

use crate::Result;
use crate::config::RendererScript;
use std::path::{Path, PathBuf};

const SHELL_TEMPLATE: &str = include_str!("../assets/index.html");
const SCRIPT_PLACEHOLDER: &str = "{{RENDERER_SCRIPT}}";
const LOCAL_SCRIPT_NAME: &str = "mermaid.min.js";

/// Shell page written to a private temporary directory, removed on drop.
#[derive(Debug)]
pub struct ShellPage {
    dir: tempfile::TempDir,
    url: String,
}

impl ShellPage {
    pub fn materialize(script: &RendererScript) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("mermshot-").tempdir()?;

        let src = match script {
            RendererScript::File(path) => {
                std::fs::copy(path, dir.path().join(LOCAL_SCRIPT_NAME))?;
                format!("./{LOCAL_SCRIPT_NAME}")
            }
            RendererScript::Url(url) => url.clone(),
        };

        let index = dir.path().join("index.html");
        std::fs::write(&index, render_shell_html(&src))?;
        let url = file_url(&index)?;
        tracing::debug!(%url, "materialized shell page");

        Ok(Self { dir, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg(test)]
    fn dir(&self) -> &Path {
        self.dir.path()
    }
}

pub(crate) fn render_shell_html(script_src: &str) -> String {
    SHELL_TEMPLATE.replace(SCRIPT_PLACEHOLDER, &escape_attr(script_src))
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn file_url(path: &Path) -> Result<String> {
    let abs: PathBuf = path.canonicalize()?;
    url::Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .map_err(|()| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot express {} as a file URL", abs.display()),
            )
            .into()
        })
}
