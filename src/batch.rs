use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::watermark::WatermarkPipeline;
use crate::BatchConfig;

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Watermarks every matching image in the input directory, bounded by
/// `max_concurrent` in-flight files.
pub struct BatchRunner {
    pipeline: Arc<WatermarkPipeline>,
    config: BatchConfig,
    extensions: Vec<String>,
}

impl BatchRunner {
    pub fn new(
        pipeline: Arc<WatermarkPipeline>,
        config: BatchConfig,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            pipeline,
            config,
            extensions,
        }
    }

    pub async fn run(&self) -> Result<BatchSummary, std::io::Error> {
        tokio::fs::create_dir_all(&self.config.output_directory).await?;

        let (files, skipped) = scan_input(&self.config.input_directory, &self.extensions);
        if skipped > 0 {
            info!("Skipping {} file(s) without a matching extension", skipped);
        }
        if files.is_empty() {
            warn!(
                "No images with extensions {:?} found in {}",
                self.extensions,
                self.config.input_directory.display()
            );
            return Ok(BatchSummary {
                skipped,
                ..BatchSummary::default()
            });
        }
        info!(
            "Batch watermarking {} file(s) from {}",
            files.len(),
            self.config.input_directory.display()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for path in files {
            let permit = semaphore.clone().acquire_owned().await;
            let Ok(permit) = permit else {
                // The semaphore is never closed while we hold it.
                break;
            };
            let pipeline = self.pipeline.clone();
            let output_dir = self.config.output_directory.clone();

            tasks.spawn(async move {
                let _permit = permit;
                process_one(&pipeline, &path, &output_dir).await
            });
        }

        let mut summary = BatchSummary {
            skipped,
            ..BatchSummary::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => summary.processed += 1,
                Ok(Err(())) => summary.failed += 1,
                Err(e) => {
                    error!("Batch worker panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch complete: {} processed, {} failed, {} skipped",
            summary.processed, summary.failed, summary.skipped
        );
        Ok(summary)
    }
}

/// Non-recursive scan, case-insensitive extension match. Regular files that
/// do not match any configured extension are counted, not silently dropped.
fn scan_input(input_directory: &Path, extensions: &[String]) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let mut skipped = 0;
    for entry in WalkDir::new(input_directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if matches_extension(&path, extensions) {
            files.push(path);
        } else {
            skipped += 1;
        }
    }
    files.sort();
    (files, skipped)
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

async fn process_one(
    pipeline: &WatermarkPipeline,
    path: &Path,
    output_dir: &Path,
) -> Result<(), ()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            return Err(());
        }
    };

    let rendered = match pipeline.process(bytes, &filename).await {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Failed to watermark {}: {}", path.display(), e);
            return Err(());
        }
    };

    let output_path = output_dir.join(format!("watermarked_{}", filename));
    if let Err(e) = tokio::fs::write(&output_path, &rendered.data).await {
        error!("Failed to write {}: {}", output_path.display(), e);
        return Err(());
    }

    info!("Watermarked {} -> {}", path.display(), output_path.display());
    Ok(())
}
