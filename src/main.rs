use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use snapdoc::document::{DirectoryTarget, PdfBackendProvider};
use snapdoc::export::RasterProvider;
use snapdoc::{
    split, ExportConfig, ExportOutcome, Exporter, HtmlRasterizerProvider, HtmlSource, Orientation, PageGeometry,
    PaperSize, RasterImage, RegionHandle, ReportMeta,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snapdoc", version, about = "Export a rendered page region as a paginated PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a region and write it as a multi-page PDF
    Export(ExportArgs),
    /// Print the page placements for an image size without rendering anything
    Plan(PlanArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Built-in renderer, no browser required
    Html,
    /// Headless Chrome (requires the `cdp` feature)
    Cdp,
}

#[derive(Args)]
struct PageArgs {
    /// Paper size: a3, a4, a5, letter, legal
    #[arg(long)]
    paper: Option<String>,
    #[arg(long)]
    landscape: bool,
}

impl PageArgs {
    fn geometry(&self) -> anyhow::Result<Option<PageGeometry>> {
        if self.paper.is_none() && !self.landscape {
            return Ok(None);
        }
        let paper = match &self.paper {
            Some(p) => p.parse::<PaperSize>()?,
            None => PaperSize::A4,
        };
        let orientation = if self.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        Ok(Some(PageGeometry::from_paper(paper, orientation)))
    }
}

#[derive(Args)]
struct ExportArgs {
    /// HTML file containing the region
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    html: Option<PathBuf>,
    /// URL of the page containing the region
    #[arg(long)]
    url: Option<String>,
    /// CSS selector of the region to export
    #[arg(long, default_value = "#report")]
    selector: String,
    /// Report JSON; its name is used for the output file name
    #[arg(long, conflicts_with = "name", required_unless_present = "name")]
    report: Option<PathBuf>,
    /// Report name, instead of --report
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    scale: Option<f64>,
    #[arg(long)]
    viewport_width: Option<u32>,
    #[arg(long, value_enum, default_value = "html")]
    backend: Backend,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct PlanArgs {
    #[arg(long)]
    width_px: u32,
    #[arg(long)]
    height_px: u32,
    #[command(flatten)]
    page: PageArgs,
}

fn raster_provider(args: &ExportArgs, config: &ExportConfig) -> anyhow::Result<RasterProvider> {
    match args.backend {
        Backend::Html => {
            let source = match (&args.html, &args.url) {
                (Some(path), _) => HtmlSource::Inline(
                    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
                ),
                (None, Some(url)) => HtmlSource::Url(url.clone()),
                (None, None) => bail!("either --html or --url is required"),
            };
            Ok(Arc::new(
                HtmlRasterizerProvider::new(source, config.viewport_width).with_timeout_ms(config.timeout_ms),
            ))
        }
        #[cfg(feature = "cdp")]
        Backend::Cdp => {
            let url = match (&args.url, &args.html) {
                (Some(url), _) => url.clone(),
                (None, Some(path)) => {
                    let abs = std::fs::canonicalize(path).with_context(|| format!("resolving {}", path.display()))?;
                    format!("file://{}", abs.display())
                }
                (None, None) => bail!("either --html or --url is required"),
            };
            Ok(Arc::new(
                snapdoc::cdp::CdpRasterizerProvider::new(url, config.viewport_width)
                    .with_timeout_ms(config.timeout_ms),
            ))
        }
        #[cfg(not(feature = "cdp"))]
        Backend::Cdp => bail!("the cdp backend requires building with `--features cdp`"),
    }
}

async fn run_export(args: ExportArgs) -> anyhow::Result<bool> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(scale) = args.scale {
        config.scale = scale;
    }
    if let Some(width) = args.viewport_width {
        config.viewport_width = width;
    }
    if let Some(geometry) = args.page.geometry()? {
        config.geometry = geometry;
    }

    let report = match (&args.report, &args.name) {
        (Some(path), _) => ReportMeta::from_json_file(path)?,
        (None, Some(name)) => ReportMeta::named(name.clone()),
        (None, None) => bail!("either --report or --name is required"),
    };

    std::fs::create_dir_all(&args.out_dir).with_context(|| format!("creating {}", args.out_dir.display()))?;

    let exporter = Exporter::new(
        config.clone(),
        raster_provider(&args, &config)?,
        Arc::new(PdfBackendProvider::default()),
        Arc::new(DirectoryTarget::new(&args.out_dir)),
    )?;

    match exporter.trigger(&RegionHandle::new(args.selector.clone()), &report).await {
        ExportOutcome::Downloaded(artifact) => {
            let location = artifact
                .location
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| artifact.file_name.clone());
            println!("{} ({} page(s), sha256 {})", location, artifact.page_count, artifact.sha256_hex());
            Ok(true)
        }
        ExportOutcome::Failed { message } => {
            eprintln!("{}", message);
            Ok(false)
        }
    }
}

fn run_plan(args: PlanArgs) -> anyhow::Result<()> {
    let geometry = args.page.geometry()?.unwrap_or_default();
    let image = RasterImage::new(args.width_px, args.height_px, Vec::new());
    let plan = split::plan(&image, &geometry)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Export(args) => {
            if !run_export(args).await? {
                std::process::exit(1);
            }
        }
        Command::Plan(args) => run_plan(args)?,
    }
    Ok(())
}
