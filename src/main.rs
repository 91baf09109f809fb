//! clipmind CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clipmind::{
    config::Config,
    error::Result,
    ingest::{ingest, IngestOptions, IngestReport, ReportStatus},
    media::FfmpegDecomposer,
    provider::{CancelFlag, HttpProvider},
    rag,
    search::{self, SearchResult},
    store::Store,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "clipmind")]
#[command(version, about = "Turn videos into persistent, queryable multimodal memory", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest one or more videos
    Ingest {
        /// Video files to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Disable window captioning
        #[arg(long)]
        no_captions: bool,

        /// Escalate captions through the dense caption cascade
        #[arg(long)]
        cascade: bool,

        /// Frame sampling rate (frames per second)
        #[arg(long)]
        fps_sample: Option<f64>,

        /// Cap on sampled frames per video
        #[arg(long)]
        max_frames: Option<usize>,

        /// Skip embedding generation
        #[arg(long)]
        no_embed: bool,

        /// Re-ingest even if the content is already indexed
        #[arg(long)]
        force: bool,

        /// Show the ingestion plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Captioning focus (general, security, sports, or free text)
        #[arg(long, default_value = "general")]
        topic: String,

        /// Videos processed concurrently
        #[arg(long, default_value = "1")]
        parallelism: usize,
    },

    /// Search indexed video content
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict to one video ID
        #[arg(long)]
        video: Option<String>,
    },

    /// Ask a question grounded in indexed video content
    Ask {
        /// The question
        question: String,

        /// Number of retrieved excerpts
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Restrict to one video ID
        #[arg(long)]
        video: Option<String>,
    },

    /// List indexed videos
    List,

    /// Show details for one video
    Info {
        /// Video ID
        video_id: String,
    },

    /// Remove a video and everything derived from it
    Remove {
        /// Video ID
        video_id: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "clipmind", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.paths.db_file = db;
    }

    if let Commands::Init { force } = cli.command {
        return handle_init(&config, force);
    }

    let store = Store::connect(&config.paths.db_file).await?;
    let provider = HttpProvider::new(&config.provider)?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Ingest {
            paths,
            no_captions,
            cascade,
            fps_sample,
            max_frames,
            no_embed,
            force,
            dry_run,
            topic,
            parallelism,
        } => {
            let options = IngestOptions {
                captions: !no_captions,
                cascade,
                fps_sample,
                max_frames,
                skip_embed: no_embed,
                force,
                dry_run,
                topic,
            };
            handle_ingest(&store, &provider, &config, paths, options, parallelism, cli.json)
                .await?;
        }

        Commands::Search { query, limit, video } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let results =
                search::search(&store, &provider, &query, limit, video.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_search_results(&results);
            }
        }

        Commands::Ask { question, top_k, video } => {
            let top_k = top_k.unwrap_or(config.search.top_k);
            let report = rag::ask(
                &store,
                &provider,
                &question,
                top_k,
                config.provider.max_retries,
                video.as_deref(),
            )
            .await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if let Some(code) = &report.error_code {
                    eprintln!("Answer unavailable ({})", code);
                } else {
                    println!("{}\n", report.answer);
                    println!("Confidence: {:.2}", report.confidence);
                }
                if !report.citations.is_empty() {
                    println!("Sources:");
                    println!("{}", rag::format_citations(&report.citations));
                }
            }
        }

        Commands::List => {
            let videos = store.list_videos().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&videos)?);
            } else if videos.is_empty() {
                println!("No videos indexed yet. Run 'clipmind ingest <file>' first.");
            } else {
                for v in &videos {
                    println!(
                        "{}  {:<40} {}  {} artifacts  [{}]",
                        v.video_id,
                        v.filename,
                        search::format_timestamp(v.duration_sec),
                        v.artifacts_count,
                        v.status
                    );
                }
            }
        }

        Commands::Info { video_id } => {
            let details = store.video_info(&video_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                let v = &details.video;
                println!("ID:         {}", v.id);
                println!("File:       {}", v.file_path);
                println!("Duration:   {}", search::format_timestamp(v.duration_sec));
                if let Some((w, h)) = v.width.zip(v.height) {
                    println!("Resolution: {}x{}", w, h);
                }
                println!("Status:     {}", v.status);
                if let Some(msg) = &v.error_message {
                    println!("Error:      {}", msg);
                }
                println!("Ingested:   {}", v.ingested_at);
                println!("Artifacts:");
                let mut counts: Vec<_> = details.artifact_counts.iter().collect();
                counts.sort();
                for (kind, count) in counts {
                    println!("  {:<22} {}", kind, count);
                }
                println!("Embedded:   {}", details.embedded_count);
            }
        }

        Commands::Remove { video_id } => {
            // Fail early with a clear error if the ID is unknown
            let video = store.get_video(&video_id).await?;
            store.delete_video(&video_id).await?;
            println!("✓ Removed '{}' and all derived data", video.filename);
        }
    }

    Ok(())
}

fn handle_init(config: &Config, force: bool) -> Result<()> {
    let path = &config.paths.config_file;
    if path.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
        std::process::exit(1);
    }
    let written = config.save()?;
    println!("✓ clipmind initialized");
    println!("  Config: {}", written.display());
    println!("\nNext steps:");
    println!("  1. Set your API key: export CLIPMIND_API_KEY=...");
    println!("  2. Ingest a video: clipmind ingest video.mp4");
    println!("  3. Search it: clipmind search \"what was said about pricing\"");
    Ok(())
}

async fn handle_ingest(
    store: &Store,
    provider: &HttpProvider,
    config: &Config,
    paths: Vec<PathBuf>,
    options: IngestOptions,
    parallelism: usize,
    json: bool,
) -> Result<()> {
    let media = FfmpegDecomposer::new();
    let cancel = CancelFlag::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling after in-flight work settles...");
                cancel.cancel();
            }
        });
    }

    let bar = if json || paths.len() == 1 {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(paths.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };

    let reports: Vec<(PathBuf, Result<IngestReport>)> = stream::iter(paths)
        .map(|path| {
            let options = options.clone();
            let cancel = cancel.clone();
            let media = &media;
            let bar = &bar;
            async move {
                let result =
                    ingest(store, provider, media, config, &path, &options, &cancel).await;
                bar.inc(1);
                (path, result)
            }
        })
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;
    bar.finish_and_clear();

    let mut failures = 0usize;
    if json {
        let ok: Vec<&IngestReport> = reports.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
        println!("{}", serde_json::to_string_pretty(&ok)?);
        for (path, result) in &reports {
            if let Err(e) = result {
                failures += 1;
                eprintln!("{}: {}", path.display(), e);
            }
        }
    } else {
        for (path, result) in &reports {
            match result {
                Ok(report) => print_ingest_report(report),
                Err(e) => {
                    failures += 1;
                    eprintln!("✗ {}: {}", path.display(), e);
                }
            }
        }
    }

    failures += reports
        .iter()
        .filter(|(_, r)| matches!(r, Ok(rep) if rep.status == ReportStatus::Failed))
        .count();
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    match report.status {
        ReportStatus::Complete => {
            println!(
                "✓ {} ingested in {:.1}s ({} artifacts)",
                report.filename, report.elapsed_sec, report.artifacts_count
            );
        }
        ReportStatus::CompleteWithWarnings => {
            println!(
                "✓ {} ingested in {:.1}s ({} artifacts, {} warning(s))",
                report.filename,
                report.elapsed_sec,
                report.artifacts_count,
                report.warnings.len()
            );
            for warning in &report.warnings {
                println!("  ⚠ {}", warning);
            }
        }
        ReportStatus::Failed => {
            println!(
                "✗ {} failed: {}",
                report.filename,
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        ReportStatus::Skipped => {
            println!(
                "- {} already indexed as {} ({} artifacts)",
                report.filename, report.video_id, report.artifacts_count
            );
        }
        ReportStatus::DryRun => {
            println!(
                "{} would run: {}",
                report.filename,
                report.planned_stages.join(", ")
            );
        }
    }
}

fn print_search_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for r in results {
        println!(
            "{:>2}. [{}] {} ({}, score {:.3})",
            r.rank, r.timestamp, r.filename, r.source_type, r.score
        );
        println!("    {}", r.text);
    }
}
