use clap::{Args, Parser, Subcommand};
use genre_atlas::{
    classify_and_layout, classify_single, load_registry, parse_url_list, preload, prepare_model,
    render_report, set_batch_progress_callback, set_download_progress_callback, BatchOptions,
    BatchProgress, LayoutConfig, ModelHandle, SingleMode, SingleOptions,
};
use std::{path::PathBuf, process};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genre-atlas")]
#[command(about = "Genre classification and similarity layout for audio URLs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ModelArgs {
    /// Registry name of the classifier
    #[arg(short, long, default_value = "genre_cnn_v1", env = "GENRE_ATLAS_MODEL")]
    model: String,

    #[arg(long, env = "GENRE_ATLAS_MANIFEST_URL")]
    manifest_url: Option<String>,

    /// Use a local ONNX file instead of the registry
    #[arg(long, env = "GENRE_ATLAS_MODEL_PATH")]
    model_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and lay out a comma-separated list of audio URLs
    Batch {
        urls: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Worker threads (default: available CPUs)
        #[arg(short, long, env = "GENRE_ATLAS_JOBS")]
        jobs: Option<usize>,

        /// Per-song fetch timeout in seconds
        #[arg(long, default_value_t = 30, env = "GENRE_ATLAS_FETCH_TIMEOUT")]
        timeout: u64,

        /// Fix noise and window selection for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 200.0)]
        min_distance: f64,

        #[arg(long, default_value_t = 1000.0)]
        max_distance: f64,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Classify one URL; prints a fallback genre instead of failing
    Single {
        url: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Also report tempo and loudness
        #[arg(long)]
        rich: bool,

        #[arg(long, default_value = "Blues")]
        fallback_genre: String,

        #[arg(long, default_value_t = 30, env = "GENRE_ATLAS_FETCH_TIMEOUT")]
        timeout: u64,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Download and verify the classifier
    Prepare {
        #[command(flatten)]
        model: ModelArgs,

        #[arg(short, long)]
        quiet: bool,
    },

    /// List available models
    List,
}

fn init_logging(default_filter: &str) {
    // stdout carries the JSON result, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let quiet = matches!(
        cli.command,
        Commands::Batch { quiet: true, .. } | Commands::Prepare { quiet: true, .. } | Commands::Single { .. }
    );
    init_logging(if quiet { "genre_atlas=warn" } else { "genre_atlas=info" });

    let result = match cli.command {
        Commands::Batch {
            urls,
            model,
            jobs,
            timeout,
            seed,
            min_distance,
            max_distance,
            quiet,
        } => {
            let opts = BatchOptions {
                jobs,
                fetch_timeout_secs: timeout,
                seed,
                layout: LayoutConfig {
                    min_distance,
                    max_distance,
                },
            };
            handle_batch(&urls, &model, opts, quiet)
        }
        Commands::Single {
            url,
            model,
            rich,
            fallback_genre,
            timeout,
            seed,
        } => {
            let opts = SingleOptions {
                mode: if rich { SingleMode::Rich } else { SingleMode::GenreOnly },
                fallback_genre,
                fetch_timeout_secs: timeout,
                seed,
            };
            handle_single(&url, &model, &opts)
        }
        Commands::Prepare { model, quiet } => handle_prepare(&model, quiet),
        Commands::List => handle_list(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_batch(
    urls: &str,
    model_args: &ModelArgs,
    opts: BatchOptions,
    quiet: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let urls = parse_url_list(urls);
    if urls.is_empty() {
        return Err("no URLs given".into());
    }
    if opts.layout.min_distance > opts.layout.max_distance {
        return Err("--min-distance must not exceed --max-distance".into());
    }

    if !quiet {
        setup_progress_callbacks();
    }

    let handle = resolve_model(model_args)?;
    let model = preload(&handle)?;

    let (placed, failed) = classify_and_layout(&urls, &opts, model)?;

    let report = render_report(&placed, failed.len())?;
    println!("{}", report.text);
    Ok(report.exit_code)
}

fn resolve_model(model_args: &ModelArgs) -> Result<ModelHandle, Box<dyn std::error::Error>> {
    prepare_model(
        &model_args.model,
        model_args.manifest_url.as_deref(),
        model_args.model_path.as_deref(),
    )
    .map_err(|e| -> Box<dyn std::error::Error> {
        if model_args.model_path.is_none() {
            format!("{e}\nhint: pass --model-path <file.onnx> or set GENRE_ATLAS_MODEL_PATH").into()
        } else {
            e.into()
        }
    })
}

fn handle_single(
    url: &str,
    model_args: &ModelArgs,
    opts: &SingleOptions,
) -> Result<i32, Box<dyn std::error::Error>> {
    let loaded = resolve_model(model_args).and_then(|h| preload(&h).map_err(Into::into));

    let output = match loaded {
        Ok(model) => classify_single(url, opts, model),
        Err(e) => {
            error!(error = %e, "model unavailable, using fallback genre");
            genre_atlas::core::single::fallback_output(opts)
        }
    };

    println!("{}", serde_json::to_string(&output)?);
    Ok(0)
}

fn handle_prepare(model_args: &ModelArgs, quiet: bool) -> Result<i32, Box<dyn std::error::Error>> {
    if !quiet {
        eprintln!("📦 Preparing model: {}", model_args.model);
        setup_progress_callbacks();
    }

    let handle = resolve_model(model_args)?;

    if !quiet {
        eprintln!("✅ Model ready at {}", handle.local_path.display());
    }

    Ok(0)
}

fn handle_list() -> Result<i32, Box<dyn std::error::Error>> {
    let registry = load_registry()?;

    eprintln!("📋 Available Models");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for model in &registry.models {
        let marker = if model.name == registry.default_model { " (default)" } else { "" };
        eprintln!("  • {}{}", model.name, marker);
        if let Some(desc) = &model.description {
            eprintln!("      {}", desc);
        }
    }

    eprintln!();
    eprintln!("Use --model <name> to specify a model");

    Ok(0)
}

fn setup_progress_callbacks() {
    set_download_progress_callback(|downloaded, total| {
        if total > 0 {
            let percent = (downloaded as f64 / total as f64 * 100.0).round() as u64;
            let downloaded_mb = downloaded as f64 / 1_000_000.0;
            let total_mb = total as f64 / 1_000_000.0;
            eprint!(
                "\r📥 Downloading model: {:>3}% ({:.2} MB / {:.2} MB)",
                percent, downloaded_mb, total_mb
            );
            if downloaded >= total {
                eprintln!();
            }
        } else {
            eprint!("\r📥 Downloading model: {:.2} MB", downloaded as f64 / 1_000_000.0);
        }
    });

    set_batch_progress_callback(|progress| match progress {
        BatchProgress::Stage(stage) => {
            let stage_name = match stage {
                "analyze" => "Fetching and classifying songs",
                "layout" => "Computing layout",
                _ => stage,
            };
            eprintln!("⏳ {}", stage_name);
        }
        BatchProgress::Songs { done, total } => {
            let percent = if total > 0 {
                done as f64 / total as f64 * 100.0
            } else {
                100.0
            };
            eprint!("\r🔄 Songs: {}/{} ({:.0}%)", done, total, percent);
            if done >= total {
                eprintln!();
            }
        }
        BatchProgress::Finished { succeeded, failed } => {
            eprintln!("✅ {} classified, {} skipped", succeeded, failed);
        }
    });
}
