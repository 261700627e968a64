use std::{path::PathBuf, time::Duration};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use modsplit::{
    jar::modification::ImageOptimizer,
    publish::{publish_all, Publisher, Uploader},
    split, Settings, SplitEvent, SplitOptions, StageProgress,
};

/// Splits a mod archive into per-module archives
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input JAR
    jar_in: PathBuf,

    /// Directory receiving the built archives
    out_dir: PathBuf,

    /// Directory holding settings.json and the publish ledger
    #[arg(long, default_value = ".")]
    defs: PathBuf,

    /// Upload changed archives after building them
    #[arg(long)]
    publish: bool,

    /// Print upload metadata instead of uploading
    #[arg(long, requires = "publish")]
    simulate: bool,

    /// Run an external optimizer over PNG entries
    #[arg(long)]
    optimize_images: bool,

    /// Optimizer program to use with --optimize-images
    #[arg(long, default_value = "optipng")]
    optimizer: String,
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn show_progress(bar: &ProgressBar, event: SplitEvent) {
    let label = event.stage.label();
    match event.progress {
        StageProgress::Unknown => bar.set_message(label),
        StageProgress::Percentage(done) => bar.set_message(format!("{} {:.0}%", label, done * 100.0)),
        StageProgress::Done => bar.finish_with_message(label),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args.defs)?;

    let optimizer = args
        .optimize_images
        .then(|| ImageOptimizer::new(&args.optimizer));
    let options = SplitOptions {
        out_dir: args.out_dir.clone(),
        optimizer,
    };

    let bar = progress_bar();
    let ctx = split(&args.jar_in, &settings, &options, |event| show_progress(&bar, event))?;
    bar.finish_and_clear();

    if !ctx.report.is_empty() {
        eprintln!("{}", ctx.report.render());
    }
    for artifact in ctx.artifacts.iter().chain(&ctx.library) {
        info!("Built {}", artifact.path.display());
    }
    if !ctx.strays.is_empty() {
        info!("{} entries were not packaged", ctx.strays.len());
    }

    if args.publish {
        let publisher = if args.simulate {
            None
        } else {
            Some(Publisher::new(&settings)?)
        };
        let summary = publish_all(
            &ctx,
            &settings,
            &args.defs,
            publisher.as_ref().map(|p| p as &dyn Uploader),
        )?;
        info!(
            "Published {}, simulated {}, unchanged {}, failed {}",
            summary.published.len(),
            summary.simulated.len(),
            summary.unchanged.len(),
            summary.failed.len()
        );
    }
    Ok(())
}
