#![forbid(unsafe_code)]

//! `mermshot` renders Mermaid diagrams to SVG, PNG or PDF by running the Mermaid JavaScript
//! renderer inside a headless Chromium.
//!
//! One browser process is launched lazily and shared by every render of a [`Renderer`]; each
//! render works in its own page, which is always closed before the call returns.
//!
//! The async entry points are runtime-agnostic: they perform blocking browser I/O on the calling
//! thread and need no particular executor. Wrap them in `spawn_blocking` (or call the `_sync`
//! variants from a worker thread) when running inside an async runtime.

pub mod browser;
pub mod chrome;
pub mod config;
pub mod error;
pub mod markdown;
pub mod render;
pub mod session;
pub mod shell;
pub mod svg;

pub use browser::{BrowserLauncher, Viewport};
pub use config::{BrowserConfig, MermaidConfig, RendererScript};
pub use error::{Error, Result};
pub use render::{OutputFormat, RenderOptions, RenderResult};
pub use session::BrowserSession;
pub use svg::sanitize_svg_id;

use chrome::ChromeLauncher;

/// Convenience wrapper bundling a browser session with default render options.
pub struct Renderer<L: BrowserLauncher = ChromeLauncher> {
    session: BrowserSession<L>,
    pub options: RenderOptions,
}

impl Default for Renderer<ChromeLauncher> {
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

impl Renderer<ChromeLauncher> {
    pub fn new(browser: BrowserConfig) -> Self {
        Self::from_session(BrowserSession::new(browser))
    }
}

impl<L: BrowserLauncher> Renderer<L> {
    pub fn from_session(session: BrowserSession<L>) -> Self {
        Self {
            session,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &BrowserSession<L> {
        &self.session
    }

    /// Starts the browser if it is not running yet. Rendering does this on demand.
    pub fn launch(&self) -> Result<()> {
        self.session.launch()
    }

    pub fn close(&self) -> Result<()> {
        self.session.close()
    }

    pub fn render_sync(
        &self,
        definition: &str,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        render::render(&self.session, definition, format, options)
    }

    pub fn render_svg_sync(&self, definition: &str) -> Result<RenderResult> {
        self.render_svg_sync_with(definition, &self.options)
    }

    pub fn render_svg_sync_with(
        &self,
        definition: &str,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        self.render_sync(definition, OutputFormat::Svg, options)
    }

    pub fn render_png_sync(&self, definition: &str) -> Result<RenderResult> {
        self.render_png_sync_with(definition, &self.options)
    }

    pub fn render_png_sync_with(
        &self,
        definition: &str,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        self.render_sync(definition, OutputFormat::Png, options)
    }

    pub fn render_pdf_sync(&self, definition: &str) -> Result<RenderResult> {
        self.render_pdf_sync_with(definition, &self.options)
    }

    /// `options.pdf_fit` only has an effect here.
    pub fn render_pdf_sync_with(
        &self,
        definition: &str,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        self.render_sync(definition, OutputFormat::Pdf, options)
    }

    pub async fn render(
        &self,
        definition: &str,
        format: OutputFormat,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        self.render_sync(definition, format, options)
    }

    pub async fn render_svg(&self, definition: &str) -> Result<RenderResult> {
        self.render_svg_sync(definition)
    }

    pub async fn render_png(&self, definition: &str) -> Result<RenderResult> {
        self.render_png_sync(definition)
    }

    pub async fn render_pdf(&self, definition: &str) -> Result<RenderResult> {
        self.render_pdf_sync(definition)
    }
}
