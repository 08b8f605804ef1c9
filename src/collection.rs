//! Batch entry point: a JSON manifest naming PDFs under a sibling `pdfs/`
//! directory, analysed in one run and written out as an export.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{run_analysis, AnalysisEngine, RunContext};
use crate::export::write_export;
use crate::models::{AnalysisResult, InputManifest};
use crate::progress::ProgressReporter;
use crate::request::{AnalysisRequest, Document};

pub fn pdf_dir(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("pdfs")
}

pub fn load_manifest(manifest_path: &Path) -> Result<InputManifest> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read input JSON at {}", manifest_path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse input JSON at {}", manifest_path.display()))
}

/// Reads the manifest and every PDF it names into a validated request.
pub fn load_request(manifest_path: &Path) -> Result<AnalysisRequest> {
    let manifest = load_manifest(manifest_path)?;
    let dir = pdf_dir(manifest_path);

    let mut documents = Vec::with_capacity(manifest.documents.len());
    for doc in &manifest.documents {
        let path = dir.join(&doc.filename);
        let content = std::fs::read(&path)
            .with_context(|| format!("PDF not found at: {}", path.display()))?;
        documents.push(Document::new(doc.filename.clone(), content));
    }

    Ok(AnalysisRequest::new(
        documents,
        manifest.persona,
        manifest.job_to_be_done.task,
    )?)
}

/// Analyses the manifest at `input`, logging progress as it arrives, and
/// writes the result to `output`.
pub async fn process_manifest(
    engine: &dyn AnalysisEngine,
    input: &Path,
    output: &Path,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<AnalysisResult> {
    let request = load_request(input)?;

    let (reporter, mut rx) = ProgressReporter::new();
    let logger = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            info!(percent = progress.percent, "{}", progress.label);
        }
    });

    let outcome = run_analysis(engine, request, RunContext::new(reporter, cancel), timeout).await;
    join_progress_logger(logger).await;
    let result = outcome.map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    write_export(&result, output)?;
    info!(output = %output.display(), "wrote analysis result");
    Ok(result)
}

/// Waits for the progress logger; returns whether it ended cleanly.
async fn join_progress_logger(logger: JoinHandle<()>) -> bool {
    match logger.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "progress logger task failed");
            false
        }
    }
}
