use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{BlankRasterizer, PageRasterizer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use viewer_core::{
    FileContent, PdfViewer, RenderDecision, ResourceRegistry, ScrollContainer, ViewerConfig,
    ViewerFile, VisibilityTick,
};

#[derive(Debug, Parser)]
#[command(name = "kbview")]
#[command(about = "Knowledge-base document viewer tools")]
pub struct Cli {
    /// Viewer configuration file (TOML). Defaults come from KBVIEW_* variables.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct Input {
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Treat FILE as base64 text instead of raw PDF bytes.
    #[arg(long)]
    base64: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[command(flatten)]
        input: Input,
    },
    /// Print the render decision of every page for a visible page.
    Plan {
        #[command(flatten)]
        input: Input,
        #[arg(long, default_value_t = 1)]
        visible: u32,
        #[arg(long)]
        scale: Option<f32>,
    },
    /// Replay recorded visibility ticks and print the visible page after each.
    Replay {
        #[command(flatten)]
        input: Input,
        /// JSON array of ticks, each an array of [page, ratio] pairs.
        #[arg(long, value_name = "JSON")]
        ticks: PathBuf,
    },
    /// Scroll through the document and print the visible page per offset.
    Scroll {
        #[command(flatten)]
        input: Input,
        #[arg(long, value_delimiter = ',', required = true)]
        offsets: Vec<f32>,
        #[arg(long, default_value_t = 800.0)]
        viewport: f32,
    },
    /// Render one page to a PNG file.
    RenderPage {
        #[command(flatten)]
        input: Input,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    page_count: u32,
    visible_page: u32,
    scale: f32,
    zoom_percent: u32,
    strip: String,
    pages: Vec<PagePlan>,
    measured_heights: BTreeMap<u32, f32>,
}

#[derive(Debug, Serialize)]
struct PagePlan {
    page: u32,
    decision: &'static str,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ReplayLine {
    tick: usize,
    visible_page: u32,
    window: [u32; 2],
}

#[derive(Debug, Serialize)]
struct ScrollLine {
    offset: f32,
    visible_page: u32,
    strip: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Info { input } => run_info(config, &input),
        Commands::Plan { input, visible, scale } => run_plan(config, &input, visible, scale),
        Commands::Replay { input, ticks } => run_replay(config, &input, &ticks),
        Commands::Scroll { input, offsets, viewport } => {
            run_scroll(config, &input, &offsets, viewport)
        }
        Commands::RenderPage { input, page, scale, output } => {
            run_render_page(config, &input, page, scale, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => ViewerConfig::from_env().context("invalid KBVIEW_* environment"),
    }
}

fn read_input(input: &Input) -> Result<ViewerFile> {
    ensure_file_exists(&input.file)?;

    let content = if input.base64 {
        FileContent::Text(fs::read_to_string(&input.file).with_context(|| {
            format!("failed to read base64 text from {}", input.file.display())
        })?)
    } else {
        FileContent::Binary(fs::read(&input.file)?)
    };

    let name = input
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_owned();

    Ok(ViewerFile::new(name, "application/pdf", content))
}

fn open_viewer(config: &ViewerConfig, input: &Input) -> Result<PdfViewer> {
    let file = read_input(input)?;
    let mut viewer = PdfViewer::with_scroll_observer(config, ResourceRegistry::new());
    viewer.open(file)?;
    Ok(viewer)
}

/// Rasterizes every page that entered the window.
fn settle(viewer: &mut PdfViewer, rasterizer: &dyn PageRasterizer) {
    for ticket in viewer.sync_window() {
        viewer.rasterize_now(rasterizer, ticket);
    }
}

fn strip(viewer: &PdfViewer) -> String {
    viewer.render_all().iter().map(RenderDecision::code).collect()
}

fn run_info(config: Option<&Path>, input: &Input) -> Result<()> {
    let config = load_config(config)?;
    let viewer = open_viewer(&config, input)?;
    let document = viewer.document().context("document is not loaded")?;

    let first_page_size_pt = document
        .page_size(1)
        .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt });

    let payload = InfoOutput {
        path: input.file.display().to_string(),
        page_count: document.page_count(),
        first_page_size_pt,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_plan(config: Option<&Path>, input: &Input, visible: u32, scale: Option<f32>) -> Result<()> {
    let config = load_config(config)?;
    let mut viewer = open_viewer(&config, input)?;
    let page_count = viewer.page_count().unwrap_or(0);

    if visible == 0 || visible > page_count {
        anyhow::bail!("--visible must be between 1 and {page_count}");
    }

    if let Some(scale) = scale {
        viewer.set_scale(scale);
    }

    viewer.apply_tick(&VisibilityTick::from_iter([(visible, 1.0)]));
    settle(&mut viewer, &BlankRasterizer);

    let pages = (1..=page_count)
        .filter_map(|page| {
            let plan = match viewer.render(page)? {
                RenderDecision::Materialize { .. } => PagePlan {
                    page,
                    decision: "materialize",
                    height: viewer.placeholder_height(page),
                },
                RenderDecision::Placeholder { height } => {
                    PagePlan { page, decision: "placeholder", height }
                }
            };
            Some(plan)
        })
        .collect();

    let measured_heights = viewer.heights().snapshot().as_ref().clone();

    let payload = PlanOutput {
        page_count,
        visible_page: viewer.visible_page().unwrap_or(visible),
        scale: viewer.scale(),
        zoom_percent: viewer.zoom().percent(),
        strip: strip(&viewer),
        pages,
        measured_heights,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_replay(config: Option<&Path>, input: &Input, ticks: &Path) -> Result<()> {
    let config = load_config(config)?;
    let raw = fs::read_to_string(ticks)
        .with_context(|| format!("failed to read ticks from {}", ticks.display()))?;
    let ticks: Vec<Vec<(u32, f32)>> =
        serde_json::from_str(&raw).context("ticks must be a JSON array of [page, ratio] arrays")?;

    let mut viewer = open_viewer(&config, input)?;
    let page_count = viewer.page_count().unwrap_or(0);
    settle(&mut viewer, &BlankRasterizer);

    for (index, entries) in ticks.into_iter().enumerate() {
        let tick: VisibilityTick = entries.into_iter().collect();
        let visible_page = viewer.apply_tick(&tick).unwrap_or(1);
        settle(&mut viewer, &BlankRasterizer);

        let window = viewer.policy().range(visible_page, page_count);
        let line = ReplayLine {
            tick: index + 1,
            visible_page,
            window: [*window.start(), *window.end()],
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(())
}

fn run_scroll(config: Option<&Path>, input: &Input, offsets: &[f32], viewport: f32) -> Result<()> {
    let config = load_config(config)?;
    let mut viewer = open_viewer(&config, input)?;
    viewer.attach(Some(ScrollContainer::new(viewport, config.page_spacing)))?;
    settle(&mut viewer, &BlankRasterizer);

    for &offset in offsets {
        let visible_page = viewer.scroll_to(offset).unwrap_or(1);
        settle(&mut viewer, &BlankRasterizer);

        let line = ScrollLine { offset, visible_page, strip: strip(&viewer) };
        println!("{}", serde_json::to_string(&line)?);
    }

    viewer.close();
    Ok(())
}

fn run_render_page(
    config: Option<&Path>,
    input: &Input,
    page: u32,
    scale: Option<f32>,
    output: Option<&Path>,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let config = load_config(config)?;
    let mut viewer = open_viewer(&config, input)?;
    if let Some(scale) = scale {
        viewer.set_scale(scale);
    }

    let document = viewer.document().context("document is not loaded")?;
    let image = BlankRasterizer
        .rasterize(document, page, viewer.scale())
        .context("failed to render page")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(&input.file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
