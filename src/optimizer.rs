//! File-level orchestration around the budgeted compressor.
//!
//! Reads explicitly named inputs, runs decode/resize/encode on a blocking
//! worker, writes the output and records a [`FileOutcome`] per file. Batch
//! runs skip past per-file failures; the compressor itself never does.

use crate::compress::compress;
use crate::image::{check_quality, decode, fit_within, flatten_alpha, Encoder, OutputFormat};
use crate::models::{CompressionResult, Config, MAX_QUALITY};
use crate::report::{BatchSummary, FileOutcome, FileReport};
use crate::{Error, Result};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What to do with each input of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Step quality down until the output fits the configured budget.
    Compress,
    /// Encode once at a fixed quality.
    Convert { quality: u8 },
}

pub struct Optimizer {
    encoder: Arc<dyn Encoder>,
    config: Config,
    force: bool,
}

impl Optimizer {
    /// Validate `config` up front so bad parameters fail before any file is
    /// touched.
    pub fn new(encoder: Arc<dyn Encoder>, config: Config) -> Result<Self> {
        config.compression.validate()?;
        validate_quality("convert_quality", config.convert_quality)?;
        if config.max_width == 0 || config.max_height == 0 {
            return Err(Error::Configuration(format!(
                "max dimensions must be positive, got {}x{}",
                config.max_width, config.max_height
            )));
        }

        info!(
            "Encoder: {:?}, budget {:.1} KB, quality {} -> {} step {}",
            encoder.format(),
            config.compression.budget_bytes as f64 / 1024.0,
            config.compression.start_quality,
            config.compression.min_quality,
            config.compression.step
        );

        Ok(Self {
            encoder,
            config,
            force: false,
        })
    }

    /// Re-encode inputs that already fit the budget instead of skipping them.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// `<stem>.<ext>` inside `output_dir`, or beside the input when no
    /// directory is given.
    pub fn output_path(&self, input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
        let stem = input.file_stem().ok_or_else(|| {
            Error::Invariant(format!("Input has no file name: {}", input.display()))
        })?;
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(self.encoder.format().extension());

        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Ok(dir.join(file_name))
    }

    /// Compress `input` to the configured budget and write it to `output`.
    ///
    /// Inputs already in the target format whose file size fits the budget
    /// are skipped unless `force` is set. Anything else is always re-encoded.
    pub async fn compress_file(&self, input: &Path, output: &Path) -> Result<FileOutcome> {
        let settings = self.config.compression;
        let data = tokio::fs::read(input).await?;
        let original_size = data.len() as u64;

        info!(
            "Compressing {} ({:.1} KB)",
            input.display(),
            original_size as f64 / 1024.0
        );

        let format = self.encoder.format();
        if !self.force
            && original_size <= settings.budget_bytes
            && OutputFormat::sniff(&data) == Some(format)
        {
            info!(
                "Already {:?} under {:.1} KB, skipping",
                format,
                settings.budget_bytes as f64 / 1024.0
            );
            return Ok(FileOutcome::Skipped {
                input_path: input.to_path_buf(),
                reason: format!("already {} under budget", format.extension()),
            });
        }

        let encoder = Arc::clone(&self.encoder);
        let (max_width, max_height) = (self.config.max_width, self.config.max_height);
        let (result, resized) = run_blocking(move || {
            let (image, resized) = load_and_fit(&data, max_width, max_height)?;
            Ok((compress(encoder.as_ref(), &image, &settings)?, resized))
        })
        .await?;

        if result.met() {
            info!("Target achieved at {}% quality", result.quality());
        } else {
            warn!(
                "Could not get {} under {:.1} KB, kept {}% quality",
                input.display(),
                settings.budget_bytes as f64 / 1024.0,
                result.quality()
            );
        }

        self.write_output(input, output, original_size, result, resized)
            .await
    }

    /// Encode `input` once at `quality` and write it to `output`.
    pub async fn convert_file(
        &self,
        input: &Path,
        output: &Path,
        quality: u8,
    ) -> Result<FileOutcome> {
        validate_quality("quality", quality)?;
        check_quality(self.encoder.as_ref(), quality)?;
        let data = tokio::fs::read(input).await?;
        let original_size = data.len() as u64;

        info!(
            "Converting {} at {}% quality",
            input.display(),
            quality
        );

        let encoder = Arc::clone(&self.encoder);
        let (max_width, max_height) = (self.config.max_width, self.config.max_height);
        let budget = self.config.compression.budget_bytes;
        let (result, resized) = run_blocking(move || {
            let (image, resized) = load_and_fit(&data, max_width, max_height)?;
            let bytes = encoder.encode(&flatten_alpha(&image), quality)?;
            Ok((CompressionResult::new(bytes, quality, budget), resized))
        })
        .await?;

        self.write_output(input, output, original_size, result, resized)
            .await
    }

    /// Run `operation` over every input, in order. A failing file is logged
    /// and recorded, and the batch moves on.
    ///
    /// Each output path is written at most once per batch: a later input
    /// that maps onto an already claimed output is recorded as failed.
    pub async fn run_batch(
        &self,
        operation: Operation,
        inputs: &[PathBuf],
        output_dir: Option<&Path>,
    ) -> Result<BatchSummary> {
        if let Operation::Convert { quality } = operation {
            validate_quality("quality", quality)?;
            check_quality(self.encoder.as_ref(), quality)?;
        }

        info!("Processing {} file(s)", inputs.len());
        let mut summary = BatchSummary::new();
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();

        for input in inputs {
            let outcome = match self.output_path(input, output_dir) {
                Ok(output) => match claimed.get(&output).copied() {
                    Some(owner) => {
                        warn!(
                            "{} and {} both map to {}",
                            owner.display(),
                            input.display(),
                            output.display()
                        );
                        Err(Error::Configuration(format!(
                            "output {} already written for {}",
                            output.display(),
                            owner.display()
                        )))
                    }
                    None => {
                        claimed.insert(output.clone(), input.as_path());
                        self.process(operation, input, &output).await
                    }
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(outcome) => summary.push(outcome),
                Err(e) => {
                    error!("Failed to process {}: {}", input.display(), e);
                    summary.push(FileOutcome::Failed {
                        input_path: input.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    async fn process(
        &self,
        operation: Operation,
        input: &Path,
        output: &Path,
    ) -> Result<FileOutcome> {
        match operation {
            Operation::Compress => self.compress_file(input, output).await,
            Operation::Convert { quality } => self.convert_file(input, output, quality).await,
        }
    }

    async fn write_output(
        &self,
        input: &Path,
        output: &Path,
        original_size: u64,
        result: CompressionResult,
        resized: bool,
    ) -> Result<FileOutcome> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let quality = result.quality();
        let met_budget = result.met();
        let optimized_size = result.size();
        tokio::fs::write(output, result.into_bytes()).await?;

        let report = FileReport {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            original_size,
            optimized_size,
            quality,
            met_budget,
            resized,
        };
        info!(
            "Wrote {} ({:.1} KB, {:.1}% smaller)",
            output.display(),
            optimized_size as f64 / 1024.0,
            report.savings_percent()
        );
        Ok(FileOutcome::Optimized(report))
    }
}

fn validate_quality(name: &str, quality: u8) -> Result<()> {
    if quality > MAX_QUALITY {
        return Err(Error::Configuration(format!(
            "{} ({}) exceeds {}",
            name, quality, MAX_QUALITY
        )));
    }
    Ok(())
}

fn load_and_fit(data: &[u8], max_width: u32, max_height: u32) -> Result<(DynamicImage, bool)> {
    let image = decode(data)?;
    Ok(match fit_within(&image, max_width, max_height) {
        Some(resized) => (resized, true),
        None => (image, false),
    })
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
}
