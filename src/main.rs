mod cli;
mod error;
mod ui;

use crate::cli::{Cli, Command, IdentifyArgs};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::StreamExt;
use shelf_catalog::Catalog;
use shelf_config::Config;
use shelf_library::identify::{Chooser, IdentifyAction, IdentifyEvent, IdentifyOptions, identify};
use shelf_library::reconcile::{Outcome, ReconcileEvent, reconcile};
use shelf_library::scan::FileIndex;
use shelf_library::{Context, Matcher, NameGenerator};
use shelf_tools::{Audible, Executables, System, ToolHandle};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match load_config(&cli) {
        Ok(config) => match &cli.command {
            Command::Process => process(&config).await,
            Command::Identify(args) => identify_files(&config, args).await,
            Command::Export => export(&config).await,
        },
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration with command-line overrides applied on top.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = shelf_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    apply_overrides(cli, &mut config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(dir) = &cli.dir {
        config.library.dir.clone_from(dir);
    }
    if let Some(catalog) = &cli.catalog {
        config.library.catalog.clone_from(catalog);
    }
    if let Some(profile) = &cli.profile {
        config.tools.profile.clone_from(profile);
    }
}

fn context(config: &Config) -> Result<Context> {
    let naming = match &config.naming.template {
        Some(template) => template.parse::<NameGenerator>().or_raise(|| ErrorKind::Config)?,
        None => NameGenerator::default(),
    };
    let matcher = Matcher {
        min_id_length: config.matching.min_id_length,
        fuzzy_candidates: config.matching.fuzzy_candidates,
        fuzzy_cutoff: config.matching.fuzzy_cutoff,
    };
    Ok(Context {
        naming,
        matcher,
        replace_alternate_sources: config.acquire.replace_alternate_sources,
        progress: None,
    })
}

fn tools(config: &Config) -> Result<ToolHandle> {
    let executables = Executables {
        audible: config.tools.audible.clone(),
        ffmpeg: config.tools.ffmpeg.clone(),
        ffprobe: config.tools.ffprobe.clone(),
    };
    let system = System::discover(
        &config.library.dir,
        &config.tools.profile,
        &executables,
        config.tools.activation_bytes.clone(),
    )
    .or_raise(|| ErrorKind::Tools)?;
    Ok(Arc::new(system))
}

/// Everything a run needs before it touches a single file. A missing
/// catalog, unreadable directory or missing tool aborts here.
async fn prepare(config: &Config) -> Result<(Catalog, FileIndex, ToolHandle, Context)> {
    let catalog = shelf_catalog::load(config.library.catalog_path()).or_raise(|| ErrorKind::Catalog)?;
    let index = FileIndex::scan(&config.library.dir).await.or_raise(|| ErrorKind::Scan)?;
    let tools = tools(config)?;
    let ctx = context(config)?;
    tracing::info!(entries = catalog.len(), files = index.len(), dir = %config.library.dir.display(), "Ready");
    Ok((catalog, index, tools, ctx))
}

#[derive(Debug, Default)]
struct Summary {
    skipped: usize,
    converted: usize,
    failed: usize,
    errors: usize,
}
impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Converted(_) => self.converted += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}
impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} converted, {} skipped, {} failed", self.converted, self.skipped, self.failed)?;
        if self.errors > 0 {
            write!(f, ", {} errored", self.errors)?;
        }
        Ok(())
    }
}

async fn process(config: &Config) -> Result<()> {
    if catalog_missing(config) {
        tracing::info!("No catalog yet; exporting it first");
        export(config).await?;
    }
    let (catalog, index, tools, mut ctx) = prepare(config).await?;
    let bar = ui::progress_bar();
    ctx.progress = Some(ui::conversion_progress(&bar));

    let mut summary = Summary::default();
    let mut events = pin!(reconcile(&tools, &ctx, &catalog, index));
    while let Some(event) = events.next().await {
        match event {
            Ok(ReconcileEvent::Started) => bar.set_message("reconciling"),
            Ok(ReconcileEvent::DiscoveryComplete(total)) => bar.set_length(total),
            Ok(ReconcileEvent::Reconciled { entry, outcome }) => {
                bar.inc(1);
                summary.record(&outcome);
                ui::say(&bar, format!("{entry}: {outcome}"));
            },
            Ok(ReconcileEvent::Complete) => bar.finish_and_clear(),
            Err(e) => {
                summary.errors += 1;
                bar.inc(1);
                bar.suspend(|| tracing::error!("{e:?}"));
            },
        }
    }

    println!("{summary}");
    if summary.errors > 0 {
        exn::bail!(ErrorKind::Incomplete(summary.errors));
    }
    Ok(())
}

async fn identify_files(config: &Config, args: &IdentifyArgs) -> Result<()> {
    let (catalog, index, tools, ctx) = prepare(config).await?;
    let bar = ui::progress_bar();
    let mut prompt = ui::Prompt::new(bar.clone());
    let chooser = if args.interactive { Some(&mut prompt as &mut dyn Chooser) } else { None };
    let options = IdentifyOptions { fallback_to_tags: args.fallback_to_tags };

    let (mut renamed, mut unidentified, mut errors) = (0, 0, 0);
    let mut events = pin!(identify(&tools, &ctx, &catalog, index, options, chooser));
    while let Some(event) = events.next().await {
        match event {
            Ok(IdentifyEvent::Started) => bar.set_message("identifying"),
            Ok(IdentifyEvent::DiscoveryComplete(total)) => bar.set_length(total),
            Ok(IdentifyEvent::Identified(action)) => {
                bar.inc(1);
                match action {
                    IdentifyAction::Renamed { from, to, method, replaced } => {
                        renamed += 1;
                        let note = if replaced { ", replaced existing file" } else { "" };
                        ui::say(&bar, format!("{from} -> {to} ({method}{note})"));
                    },
                    IdentifyAction::AlreadyCorrect(name) => tracing::debug!(file = %name, "Already named correctly"),
                    IdentifyAction::Unidentified { file, reason } => {
                        unidentified += 1;
                        ui::say(&bar, format!("{file}: not renamed, {reason}"));
                    },
                }
            },
            Ok(IdentifyEvent::Complete) => bar.finish_and_clear(),
            Err(e) => {
                errors += 1;
                bar.inc(1);
                bar.suspend(|| tracing::error!("{e:?}"));
            },
        }
    }

    println!("{renamed} renamed, {unidentified} not identified");
    if errors > 0 {
        exn::bail!(ErrorKind::Incomplete(errors));
    }
    Ok(())
}

fn catalog_missing(config: &Config) -> bool {
    !config.library.catalog_path().exists()
}

async fn export(config: &Config) -> Result<()> {
    let path = config.library.catalog_path();
    if !catalog_missing(config) {
        tracing::info!(path = %path.display(), "Catalog already exists; nothing to export");
        return Ok(());
    }
    let audible = Audible::discover(&config.tools.profile, config.tools.audible.as_deref()).or_raise(|| ErrorKind::Tools)?;
    audible.export_library(&path).await.or_raise(|| ErrorKind::Export)?;
    let catalog = shelf_catalog::load(&path).or_raise(|| ErrorKind::Catalog)?;
    println!("Exported {} entries to {}", catalog.len(), path.display());
    Ok(())
}
