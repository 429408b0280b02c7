//! End-to-end renders against a local Chromium.
//!
//! Ignored by default. `MERMSHOT_RENDERER_SCRIPT` may point at a local `mermaid.min.js` to avoid
//! the CDN.

use futures::executor::block_on;
use mermshot::{
    BrowserConfig, Error, MermaidConfig, OutputFormat, RenderOptions, Renderer, RendererScript,
};

fn renderer() -> Renderer {
    let mut config = BrowserConfig::default();
    if let Ok(script) = std::env::var("MERMSHOT_RENDERER_SCRIPT") {
        config.renderer_script = RendererScript::parse(&script);
    }
    Renderer::new(config)
}

#[test]
#[ignore = "requires Chromium"]
fn flowchart_svg_has_both_nodes_and_an_edge() {
    let renderer = renderer();
    let out = block_on(renderer.render_svg("graph LR; A-->B")).unwrap();
    let svg = String::from_utf8(out.data).unwrap();

    let doc = roxmltree::Document::parse(&svg).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "svg");
    let labels: Vec<String> = root
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .map(|t| t.trim().to_string())
        .collect();
    assert!(labels.iter().any(|t| t == "A"), "labels: {labels:?}");
    assert!(labels.iter().any(|t| t == "B"), "labels: {labels:?}");
    assert!(
        root.descendants()
            .any(|n| n.attribute("class").is_some_and(|c| c.contains("flowchart-link"))),
        "no edge path in {svg}"
    );
    renderer.close().unwrap();
}

#[test]
#[ignore = "requires Chromium"]
fn accessible_title_and_description_are_extracted() {
    let renderer = renderer();
    let definition = "flowchart TD\n  accTitle: Order pipeline\n  accDescr: Orders move on\n  A --> B\n";
    let out = renderer.render_svg_sync(definition).unwrap();
    assert_eq!(out.title.as_deref(), Some("Order pipeline"));
    assert_eq!(out.desc.as_deref(), Some("Orders move on"));

    let plain = renderer.render_svg_sync("graph LR; A-->B").unwrap();
    assert_eq!(plain.title, None);
    renderer.close().unwrap();
}

#[test]
#[ignore = "requires Chromium"]
fn invalid_diagram_fails_every_format_without_leaking_pages() {
    let renderer = renderer();
    renderer.launch().unwrap();
    let before = renderer.session().page_count();
    for format in [OutputFormat::Svg, OutputFormat::Png, OutputFormat::Pdf] {
        let err = renderer
            .render_sync("graph LR;\n  A-->", format, &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Render { .. }), "{err}");
    }
    assert_eq!(renderer.session().page_count(), before);
    renderer.close().unwrap();
}

#[test]
#[ignore = "requires Chromium"]
fn png_and_pdf_have_their_signatures() {
    let renderer = renderer();
    let png = renderer.render_png_sync("graph TD; A-->B-->C").unwrap();
    assert!(png.data.starts_with(b"\x89PNG\r\n\x1a\n"));

    let options = RenderOptions {
        pdf_fit: true,
        background_color: "transparent".to_string(),
        ..Default::default()
    };
    let pdf = renderer
        .render_pdf_sync_with("graph TD; A-->B-->C", &options)
        .unwrap();
    assert!(pdf.data.starts_with(b"%PDF-"));
    renderer.close().unwrap();
}

/// `(width, height)` from the root `viewBox`.
fn view_box_size(svg: &str) -> (f64, f64) {
    let doc = roxmltree::Document::parse(svg).unwrap();
    let view_box = doc.root_element().attribute("viewBox").unwrap();
    let parts: Vec<f64> = view_box
        .split_whitespace()
        .map(|p| p.parse().unwrap())
        .collect();
    (parts[2], parts[3])
}

fn png_size(bytes: &[u8]) -> (u32, u32) {
    let reader = png::Decoder::new(std::io::Cursor::new(bytes))
        .read_info()
        .unwrap();
    let info = reader.info();
    (info.width, info.height)
}

#[test]
#[ignore = "requires Chromium"]
fn png_covers_a_diagram_wider_than_the_viewport() {
    let renderer = renderer();
    let nodes: Vec<String> = (0..14).map(|i| format!("N{i}[Step number {i}]")).collect();
    let definition = format!("flowchart LR\n  {}\n", nodes.join(" --> "));
    let options = RenderOptions {
        config: MermaidConfig::from_value(serde_json::json!({"flowchart": {"useMaxWidth": false}})),
        ..Default::default()
    };

    let svg = renderer
        .render_sync(&definition, OutputFormat::Svg, &options)
        .unwrap();
    let (content_w, content_h) = view_box_size(std::str::from_utf8(&svg.data).unwrap());
    assert!(content_w > 800.0, "diagram is only {content_w}px wide");

    let png = renderer
        .render_sync(&definition, OutputFormat::Png, &options)
        .unwrap();
    let (width, height) = png_size(&png.data);
    assert!(f64::from(width) >= content_w.floor(), "{width} < {content_w}");
    assert!(f64::from(height) >= content_h.floor(), "{height} < {content_h}");

    let scaled = RenderOptions {
        viewport: Some(mermshot::Viewport::default().with_scale(2.0)),
        ..options
    };
    let png = renderer
        .render_sync(&definition, OutputFormat::Png, &scaled)
        .unwrap();
    let (width, height) = png_size(&png.data);
    assert!(f64::from(width) >= 2.0 * content_w.floor(), "{width} < 2 x {content_w}");
    assert!(f64::from(height) >= 2.0 * content_h.floor(), "{height} < 2 x {content_h}");
    renderer.close().unwrap();
}

#[test]
#[ignore = "requires Chromium"]
fn launch_is_idempotent_and_close_twice_is_fine() {
    let renderer = renderer();
    renderer.launch().unwrap();
    let pid = renderer.session().process_id();
    renderer.launch().unwrap();
    assert_eq!(renderer.session().process_id(), pid);
    renderer.close().unwrap();
    renderer.close().unwrap();
    assert!(!renderer.session().is_launched());
}
