use clap::Parser;
use futures::executor::block_on;
use mermshot::markdown::{self, MarkdownImage};
use mermshot::{
    BrowserConfig, MermaidConfig, OutputFormat, RenderOptions, Renderer, RendererScript, Viewport,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("I/O error on {}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Stdio(#[from] std::io::Error),
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Render(#[from] mermshot::Error),
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>()
        .map_err(|()| format!("unsupported output format `{s}` (expected svg, png or pdf)"))
}

/// Render Mermaid diagrams (or the Mermaid fences of a Markdown file) through headless Chromium.
#[derive(Debug, Parser)]
#[command(name = "mermshot", version)]
struct Args {
    /// Input file. Omit or pass `-` to read from stdin. `.md`/`.markdown` files have each Mermaid
    /// fence rendered and replaced with an image link.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file, `-` for stdout. SVG goes to stdout by default; PNG/PDF default to the input
    /// path with the format's extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format. Defaults to the output file's extension, else svg.
    #[arg(short = 'e', long, value_parser = parse_format)]
    output_format: Option<OutputFormat>,

    /// CSS background color, or `transparent`.
    #[arg(short, long, default_value = "white")]
    background_color: String,

    /// Mermaid theme (default, forest, dark, neutral).
    #[arg(short, long)]
    theme: Option<String>,

    /// Page width in pixels.
    #[arg(short, long, default_value_t = 800)]
    width: u32,

    /// Page height in pixels.
    #[arg(short = 'H', long, default_value_t = 600)]
    height: u32,

    /// Device scale factor for PNG output.
    #[arg(short, long, default_value_t = 1.0)]
    scale: f64,

    /// JSON file passed to `mermaid.initialize`.
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// CSS file injected into the rendered SVG.
    #[arg(short = 'C', long)]
    css_file: Option<PathBuf>,

    /// JSON file with browser launch settings.
    #[arg(short = 'p', long)]
    browser_config_file: Option<PathBuf>,

    /// Size the PDF page to the diagram.
    #[arg(short = 'f', long)]
    pdf_fit: bool,

    /// Id of the root `<svg>` element.
    #[arg(short = 'I', long, default_value = "my-svg")]
    svg_id: String,

    /// Path or URL of `mermaid.min.js`. Overrides the browser config file.
    #[arg(long)]
    renderer_script: Option<String>,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Single { format: OutputFormat, target: Target },
    Markdown { format: OutputFormat, output: PathBuf },
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
}

fn is_dash(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn default_out_path(input: Option<&Path>, ext: &str) -> PathBuf {
    match input {
        Some(path) if !is_dash(path) => path.with_extension(ext),
        _ => PathBuf::from(format!("out.{ext}")),
    }
}

fn plan(args: &Args) -> Result<Plan, CliError> {
    let input = args.input.as_deref();
    let output = args.output.as_deref();
    let markdown_in = input.is_some_and(is_markdown);
    let markdown_out = output.is_some_and(is_markdown);

    if markdown_in {
        let Some(output) = output.filter(|o| markdown_out && !is_dash(o)) else {
            return Err(CliError::Usage(
                "Markdown input needs a Markdown --output file (e.g. -o out.md)".to_string(),
            ));
        };
        return Ok(Plan::Markdown {
            format: args.output_format.unwrap_or_default(),
            output: output.to_path_buf(),
        });
    }
    if markdown_out {
        return Err(CliError::Usage(
            "a Markdown --output requires a Markdown --input".to_string(),
        ));
    }

    let from_ext = output
        .filter(|o| !is_dash(o))
        .and_then(|o| o.extension())
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<OutputFormat>().ok());
    let format = match (args.output_format, from_ext) {
        (Some(explicit), _) => explicit,
        (None, Some(ext)) => ext,
        (None, None) if output.is_some_and(|o| !is_dash(o)) => {
            return Err(CliError::Usage(
                "cannot infer the output format from --output; pass --output-format".to_string(),
            ));
        }
        (None, None) => OutputFormat::Svg,
    };

    let target = match output {
        Some(o) if is_dash(o) => Target::Stdout,
        Some(o) => Target::File(o.to_path_buf()),
        None if format == OutputFormat::Svg => Target::Stdout,
        None => Target::File(default_out_path(input, format.extension())),
    };
    Ok(Plan::Single { format, target })
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })
}

fn read_input(input: Option<&Path>) -> Result<String, CliError> {
    match input {
        Some(path) if !is_dash(path) => read_file(path),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_json<T>(
    path: &Path,
    parse: impl FnOnce(&str) -> serde_json::Result<T>,
) -> Result<T, CliError> {
    parse(&read_file(path)?).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_output(bytes: &[u8], target: &Target) -> Result<(), CliError> {
    match target {
        Target::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(bytes)?;
            out.flush()?;
            Ok(())
        }
        Target::File(path) => std::fs::write(path, bytes).map_err(|source| CliError::File {
            path: path.clone(),
            source,
        }),
    }
}

fn render_options(args: &Args) -> Result<RenderOptions, CliError> {
    if !(args.scale.is_finite() && args.scale > 0.0) {
        return Err(CliError::Usage("--scale must be a positive number".to_string()));
    }
    if args.width == 0 || args.height == 0 {
        return Err(CliError::Usage(
            "--width and --height must be positive".to_string(),
        ));
    }

    let mut config = MermaidConfig::empty_object();
    if let Some(theme) = &args.theme {
        config.set_value("theme", serde_json::json!(theme));
    }
    if let Some(path) = &args.config_file {
        let overrides = read_json(path, MermaidConfig::from_json_str)?;
        config.deep_merge(overrides.as_value());
    }

    let extra_css = args.css_file.as_deref().map(read_file).transpose()?;

    Ok(RenderOptions {
        viewport: Some(Viewport::new(args.width, args.height).with_scale(args.scale)),
        background_color: args.background_color.clone(),
        config,
        extra_css,
        pdf_fit: args.pdf_fit,
        svg_id: args.svg_id.clone(),
    })
}

fn browser_config(args: &Args) -> Result<BrowserConfig, CliError> {
    let mut config = match &args.browser_config_file {
        Some(path) => read_json(path, BrowserConfig::from_json_str)?,
        None => BrowserConfig::default(),
    };
    if let Some(script) = &args.renderer_script {
        config.renderer_script = RendererScript::parse(script);
    }
    Ok(config)
}

fn render_markdown(
    renderer: &Renderer,
    text: &str,
    format: OutputFormat,
    output: &Path,
) -> Result<(), CliError> {
    let blocks = markdown::find_diagrams(text);
    if blocks.is_empty() {
        tracing::warn!("no Mermaid diagrams found in the Markdown input");
    }

    let mut images = Vec::with_capacity(blocks.len());
    for (idx, block) in blocks.iter().enumerate() {
        let path = markdown::image_path(output, idx + 1, format.extension());
        tracing::info!(
            "rendering diagram {}/{} to {}",
            idx + 1,
            blocks.len(),
            path.display()
        );
        let result = block_on(renderer.render(&block.definition, format, &renderer.options))?;
        write_output(&result.data, &Target::File(path.clone()))?;
        images.push(MarkdownImage {
            url: markdown::relative_image_url(&path),
            title: result.title,
            desc: result.desc,
        });
    }

    let rewritten = markdown::replace_diagrams(text, &blocks, &images);
    write_output(rewritten.as_bytes(), &Target::File(output.to_path_buf()))
}

fn run(args: Args) -> Result<(), CliError> {
    let plan = plan(&args)?;
    let options = render_options(&args)?;
    let browser = browser_config(&args)?;
    let text = read_input(args.input.as_deref())?;

    let renderer = Renderer::new(browser).with_options(options);
    let rendered = match &plan {
        Plan::Single { format, target } => {
            tracing::info!("generating single Mermaid diagram");
            block_on(renderer.render(&text, *format, &renderer.options))
                .map_err(CliError::from)
                .and_then(|result| write_output(&result.data, target))
        }
        Plan::Markdown { format, output } => render_markdown(&renderer, &text, *format, output),
    };
    let closed = renderer.close();
    rendered?;
    closed?;
    Ok(())
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "warn,mermshot_cli=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.quiet);

    match run(args) {
        Ok(()) => {}
        Err(err @ CliError::Usage(_)) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
