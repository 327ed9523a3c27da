use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webp_squeeze::image::OutputFormat;
use webp_squeeze::models::{Config, MAX_QUALITY};
use webp_squeeze::optimizer::{Operation, Optimizer};
use webp_squeeze::report::{write_json_report, FileOutcome};

#[derive(Debug, Parser)]
#[command(name = "webp-squeeze")]
#[command(about = "Compress web image assets to a size budget")]
struct CliArgs {
    /// Write a JSON report of every processed file.
    #[arg(long, global = true, value_name = "PATH")]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Step quality down until each image fits the size budget.
    Compress {
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        /// Maximum output size in KB.
        #[arg(long, value_name = "KB")]
        max_size_kb: Option<u64>,

        #[arg(long, value_parser = parse_quality)]
        start_quality: Option<u8>,

        #[arg(long, value_parser = parse_quality)]
        min_quality: Option<u8>,

        /// Quality decrement per attempt.
        #[arg(long)]
        step: Option<u8>,

        /// Recompress inputs that already fit the budget.
        #[arg(long)]
        force: bool,
    },
    /// Encode each image once at a fixed quality.
    Convert {
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[arg(long, value_parser = parse_quality)]
        quality: Option<u8>,
    },
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Directory for outputs; defaults to each input's directory.
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "webp")]
    format: OutputFormat,

    /// Downscale wider images to this width.
    #[arg(long)]
    max_width: Option<u32>,

    /// Downscale taller images to this height.
    #[arg(long)]
    max_height: Option<u32>,
}

fn parse_quality(input: &str) -> std::result::Result<u8, String> {
    match input.parse::<u8>() {
        Ok(q) if q <= MAX_QUALITY => Ok(q),
        _ => Err(format!(
            "Invalid quality '{}'. Expected an integer from 0 to {}",
            input, MAX_QUALITY
        )),
    }
}

/// Fold command-line overrides into the environment config.
fn apply_overrides(mut config: Config, command: &Command) -> Config {
    let output = match command {
        Command::Compress {
            output,
            max_size_kb,
            start_quality,
            min_quality,
            step,
            ..
        } => {
            if let Some(kb) = max_size_kb {
                config.compression.budget_bytes = kb.saturating_mul(1024);
            }
            if let Some(q) = start_quality {
                config.compression.start_quality = *q;
            }
            if let Some(q) = min_quality {
                config.compression.min_quality = *q;
            }
            if let Some(s) = step {
                config.compression.step = *s;
            }
            output
        }
        Command::Convert {
            output, quality, ..
        } => {
            if let Some(q) = quality {
                config.convert_quality = *q;
            }
            output
        }
    };

    if let Some(w) = output.max_width {
        config.max_width = w;
    }
    if let Some(h) = output.max_height {
        config.max_height = h;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webp_squeeze=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => apply_overrides(config, &args.command),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (inputs, output, operation, force) = match &args.command {
        Command::Compress {
            inputs,
            output,
            force,
            ..
        } => (inputs, output, Operation::Compress, *force),
        Command::Convert { inputs, output, .. } => (
            inputs,
            output,
            Operation::Convert {
                quality: config.convert_quality,
            },
            false,
        ),
    };

    let optimizer = match Optimizer::new(output.format.encoder(), config) {
        Ok(optimizer) => optimizer.with_force(force),
        Err(e) => {
            error!("Invalid settings: {}", e);
            std::process::exit(1);
        }
    };

    let summary = match optimizer
        .run_batch(operation, inputs, output.output_dir.as_deref())
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            error!("Batch failed: {}", e);
            std::process::exit(1);
        }
    };

    for outcome in &summary.outcomes {
        if let FileOutcome::Optimized(report) = outcome {
            println!("{}", report.input_path.display());
            println!("{}", report);
        }
    }
    println!("{}", summary);

    if let Some(path) = &args.report {
        write_json_report(path, &summary)?;
    }

    if summary.failed_count() > 0 {
        error!("{} file(s) failed", summary.failed_count());
        std::process::exit(1);
    }

    info!("Image optimization completed");
    Ok(())
}
