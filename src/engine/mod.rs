//! The analysis engine contract and the runner that drives one run to a
//! terminal state.

mod pdf;
mod simulated;

pub use pdf::PdfEngine;
pub use simulated::SimulatedEngine;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{AnalysisError, EngineFailure};
use crate::models::AnalysisResult;
use crate::progress::{ProgressReporter, Stage};
use crate::request::AnalysisRequest;

/// Turns a validated request into a result.
///
/// Implementations report each finished stage through [`RunContext::checkpoint`],
/// which is also where a cancelled run stops.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(
        &self,
        request: AnalysisRequest,
        ctx: &RunContext,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Progress and cancellation handles for a single run.
#[derive(Debug, Clone)]
pub struct RunContext {
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(progress: ProgressReporter, cancel: CancellationToken) -> Self {
        Self { progress, cancel }
    }

    /// Context nobody observes or cancels.
    pub fn detached() -> Self {
        Self::new(ProgressReporter::detached(), CancellationToken::new())
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn ensure_active(&self) -> Result<(), AnalysisError> {
        if self.cancel.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Records `stage` as done, unless the run was cancelled meanwhile.
    pub fn checkpoint(&self, stage: Stage) -> Result<(), AnalysisError> {
        self.ensure_active()?;
        self.progress.complete(stage);
        Ok(())
    }

    /// Sleeps for `duration`, waking early if the run is cancelled.
    pub async fn pause(&self, duration: Duration) -> Result<(), AnalysisError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AnalysisError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Runs `engine` on `request` until it succeeds, fails, exceeds `timeout` or
/// is cancelled through the context's token. The request, and with it every
/// document buffer, is dropped before this returns on every path.
pub async fn run_analysis(
    engine: &dyn AnalysisEngine,
    request: AnalysisRequest,
    ctx: RunContext,
    timeout: Duration,
) -> Result<AnalysisResult, AnalysisError> {
    info!(
        engine = engine.name(),
        documents = request.documents().len(),
        role = %request.persona().role,
        "starting analysis"
    );

    let cancel = ctx.cancel.clone();
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
        res = tokio::time::timeout(timeout, engine.analyze(request, &ctx)) => match res {
            Ok(res) => res,
            Err(_) => Err(AnalysisError::Timeout(timeout)),
        },
    };

    let outcome = outcome.and_then(|result| {
        result.check_ranks().map_err(EngineFailure::Ranking)?;
        Ok(result)
    });

    match &outcome {
        Ok(result) => {
            ctx.progress.complete(Stage::GeneratingAnalysis);
            info!(
                sections = result.extracted_sections.len(),
                subsections = result.subsection_analysis.len(),
                "analysis complete"
            );
        }
        Err(e) => warn!(kind = e.kind(), error = %e, "analysis ended without a result"),
    }
    outcome
}
