use crate::browser::{Browser, BrowserLauncher, Clip, Page, PageGuard, PdfOptions, Viewport};
use crate::config::MermaidConfig;
use crate::session::BrowserSession;
use crate::svg::{extract_metadata, sanitize_svg_id};
use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

/// CSS pixels per inch, used to express page sizes to the PDF printer.
const CSS_PX_PER_INCH: f64 = 96.0;

pub const TRANSPARENT: &str = "transparent";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "pdf" => Ok(Self::Pdf),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Applied before navigation. Raster output falls back to [`Viewport::default`].
    pub viewport: Option<Viewport>,
    /// Any CSS color; `"transparent"` also drops the page background from PNG/PDF output.
    pub background_color: String,
    pub config: MermaidConfig,
    /// Injected as a `<style>` element inside the rendered `<svg>`.
    pub extra_css: Option<String>,
    /// Size the PDF page to the diagram instead of the default paper size.
    pub pdf_fit: bool,
    pub svg_id: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: None,
            background_color: "white".to_string(),
            config: MermaidConfig::default(),
            extra_css: None,
            pdf_fit: false,
            svg_id: "my-svg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub title: Option<String>,
    pub desc: Option<String>,
    /// UTF-8 SVG markup, PNG bytes or PDF bytes, matching the requested format.
    pub data: Vec<u8>,
}

/// What the shell page hands back after running Mermaid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderedSvg {
    pub svg: String,
    pub rect: Clip,
    pub background_applied: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageReply {
    ok: bool,
    error: Option<String>,
    svg: Option<String>,
    rect: Option<Clip>,
    #[serde(default)]
    background_applied: bool,
}

/// Renders `definition` in a fresh page of the session's browser.
///
/// The page is closed on every exit path, including render errors.
pub fn render<L: BrowserLauncher>(
    session: &BrowserSession<L>,
    definition: &str,
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<RenderResult> {
    tracing::debug!(?format, theme = ?options.config.get_str("theme"), "rendering diagram");
    let (browser, shell) = session.acquire()?;
    let page = PageGuard::new(browser.new_page()?);
    page.on_console(Box::new(|line| {
        tracing::debug!(target: "mermshot::page", "{line}");
    }))?;

    if let Some(viewport) = &options.viewport {
        page.set_viewport(viewport)?;
    }
    page.navigate(shell.url())?;

    let script = page_script(definition, options);
    let rendered = decode_reply(&page.evaluate(&script)?)?;
    if !rendered.background_applied {
        tracing::warn!("rendered markup has no <svg> root to apply the background to");
    }

    let meta = extract_metadata(&rendered.svg)?;
    let transparent = is_transparent(&options.background_color);

    let data = match format {
        OutputFormat::Svg => rendered.svg.into_bytes(),
        OutputFormat::Png => {
            let clip = raster_clip(&rendered.rect);
            let base = options.viewport.unwrap_or_default();
            page.set_viewport(&grow_viewport(&base, &clip))?;
            if transparent {
                page.set_transparent_background()?;
            }
            page.screenshot_png(&clip, base.scale())?
        }
        OutputFormat::Pdf => {
            if transparent {
                page.set_transparent_background()?;
            }
            page.print_pdf(&pdf_options(options, &rendered.rect))?
        }
    };

    tracing::debug!(?format, bytes = data.len(), "render finished");
    Ok(RenderResult {
        title: meta.title,
        desc: meta.desc,
        data,
    })
}

pub(crate) fn is_transparent(background_color: &str) -> bool {
    background_color.trim().eq_ignore_ascii_case(TRANSPARENT)
}

/// Screenshot region: top-left floored, size rounded up.
pub(crate) fn raster_clip(rect: &Clip) -> Clip {
    Clip {
        x: rect.x.floor(),
        y: rect.y.floor(),
        width: rect.width.ceil(),
        height: rect.height.ceil(),
    }
}

/// The viewport must cover the whole clip or the screenshot comes back cropped.
pub(crate) fn grow_viewport(viewport: &Viewport, clip: &Clip) -> Viewport {
    let need_w = (clip.x + clip.width).max(0.0).ceil() as u32;
    let need_h = (clip.y + clip.height).max(0.0).ceil() as u32;
    Viewport {
        width: viewport.width.max(need_w),
        height: viewport.height.max(need_h),
        device_scale_factor: viewport.device_scale_factor,
    }
}

pub(crate) fn pdf_options(options: &RenderOptions, rect: &Clip) -> PdfOptions {
    let print_background = !is_transparent(&options.background_color);
    if !options.pdf_fit {
        return PdfOptions {
            print_background,
            ..Default::default()
        };
    }

    // The page is sized to the content plus the same offset on both sides, so nothing clips.
    let width_px = rect.width.ceil() + rect.x * 2.0;
    let height_px = rect.height.ceil() + rect.y * 2.0;
    PdfOptions {
        print_background,
        paper_width: Some(width_px / CSS_PX_PER_INCH),
        paper_height: Some(height_px / CSS_PX_PER_INCH),
        page_ranges: Some("1-1".to_string()),
    }
}

/// Builds the expression evaluated in the shell page.
///
/// Inputs cross into the page as one JSON literal and the page answers with one JSON string, so
/// nothing is shared with the page beyond that message.
pub(crate) fn page_script(definition: &str, options: &RenderOptions) -> String {
    let input = serde_json::json!({
        "definition": definition,
        "config": options.config.to_initialize_value(),
        "svgId": sanitize_svg_id(&options.svg_id),
        "backgroundColor": options.background_color,
        "extraCss": options.extra_css,
    });
    PAGE_SCRIPT_TEMPLATE.replace("__INPUT__", &input.to_string())
}

const PAGE_SCRIPT_TEMPLATE: &str = r#"(async () => {
  const input = __INPUT__;
  try {
    document.body.style.background = input.backgroundColor;
    if (typeof mermaid === "undefined") {
      throw new Error("mermaid is not loaded in the shell page");
    }
    const container = document.getElementById("container");
    mermaid.initialize(input.config);
    const { svg: markup } = await mermaid.render(input.svgId, input.definition, container);
    container.innerHTML = markup;

    const svg = container.getElementsByTagName("svg")[0];
    if (!svg) {
      return JSON.stringify({ ok: false, error: "renderer produced no <svg> element" });
    }
    let backgroundApplied = false;
    if (svg.style) {
      svg.style.backgroundColor = input.backgroundColor;
      backgroundApplied = true;
    }
    if (input.extraCss !== null) {
      const style = document.createElementNS("http://www.w3.org/2000/svg", "style");
      style.appendChild(document.createTextNode(input.extraCss));
      svg.appendChild(style);
    }

    const r = svg.getBoundingClientRect();
    return JSON.stringify({
      ok: true,
      svg: new XMLSerializer().serializeToString(svg),
      rect: { x: r.left, y: r.top, width: r.width, height: r.height },
      backgroundApplied,
    });
  } catch (err) {
    return JSON.stringify({ ok: false, error: String((err && err.message) || err) });
  }
})()"#;

pub(crate) fn decode_reply(raw: &str) -> Result<RenderedSvg> {
    let reply: PageReply = serde_json::from_str(raw).map_err(|e| Error::PageProtocol {
        message: e.to_string(),
    })?;

    if !reply.ok {
        return Err(Error::Render {
            message: reply
                .error
                .unwrap_or_else(|| "unknown renderer error".to_string()),
        });
    }

    match (reply.svg, reply.rect) {
        (Some(svg), Some(rect)) => Ok(RenderedSvg {
            svg,
            rect,
            background_applied: reply.background_applied,
        }),
        _ => Err(Error::PageProtocol {
            message: "successful reply is missing `svg` or `rect`".to_string(),
        }),
    }
}
