use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Discrete checkpoints of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    ExtractingText,
    InterpretingPersona,
    IdentifyingSections,
    RankingImportance,
    GeneratingAnalysis,
}

impl Stage {
    pub const PIPELINE: [Stage; 5] = [
        Stage::ExtractingText,
        Stage::InterpretingPersona,
        Stage::IdentifyingSections,
        Stage::RankingImportance,
        Stage::GeneratingAnalysis,
    ];

    /// Percentage reached once this stage is done.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Queued => 0,
            Stage::ExtractingText => 20,
            Stage::InterpretingPersona => 40,
            Stage::IdentifyingSections => 60,
            Stage::RankingImportance => 80,
            Stage::GeneratingAnalysis => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Queued => "Waiting to start...",
            Stage::ExtractingText => "Extracting text from documents...",
            Stage::InterpretingPersona => "Analyzing persona requirements...",
            Stage::IdentifyingSections => "Identifying relevant sections...",
            Stage::RankingImportance => "Ranking importance...",
            Stage::GeneratingAnalysis => "Generating refined analysis...",
        }
    }

    fn previous(self) -> Stage {
        match self {
            Stage::Queued | Stage::ExtractingText => Stage::Queued,
            Stage::InterpretingPersona => Stage::ExtractingText,
            Stage::IdentifyingSections => Stage::InterpretingPersona,
            Stage::RankingImportance => Stage::IdentifyingSections,
            Stage::GeneratingAnalysis => Stage::RankingImportance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub percent: u8,
    pub stage: Stage,
    pub label: &'static str,
}

impl Progress {
    pub fn initial() -> Self {
        Self {
            percent: 0,
            stage: Stage::Queued,
            label: Stage::Queued.label(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// Publishes progress for one run. Values never go backwards: a report below
/// the current percentage is dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<Progress>>,
}

impl ProgressReporter {
    pub fn new() -> (Self, watch::Receiver<Progress>) {
        let (tx, rx) = watch::channel(Progress::initial());
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Reporter with no subscriber, for callers that don't observe progress.
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }

    /// Marks `stage` as finished.
    pub fn complete(&self, stage: Stage) {
        self.publish(stage.percent(), stage);
    }

    /// Reports `done` of `total` units of work inside `stage`, interpolated
    /// between the previous checkpoint and this stage's checkpoint.
    pub fn partial(&self, stage: Stage, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let from = stage.previous().percent() as usize;
        let to = stage.percent() as usize;
        let percent = from + (to - from) * done.min(total) / total;
        self.publish(percent as u8, stage);
    }

    fn publish(&self, percent: u8, stage: Stage) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| {
            if percent < current.percent {
                warn!(
                    from = current.percent,
                    to = percent,
                    "ignoring progress that would move backwards"
                );
                return false;
            }
            if percent == current.percent && stage == current.stage {
                return false;
            }
            *current = Progress {
                percent,
                stage,
                label: stage.label(),
            };
            debug!(percent, stage = stage.label(), "progress");
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_percentages_increase_to_100() {
        let percents: Vec<u8> = Stage::PIPELINE.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, vec![20, 40, 60, 80, 100]);
    }

    #[test]
    fn test_backwards_progress_is_ignored() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.complete(Stage::RankingImportance);
        reporter.complete(Stage::ExtractingText);
        assert_eq!(rx.borrow().percent, 80);
        assert_eq!(rx.borrow().stage, Stage::RankingImportance);
    }

    #[test]
    fn test_partial_interpolates_within_stage() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.partial(Stage::ExtractingText, 1, 4);
        assert_eq!(rx.borrow().percent, 5);
        reporter.partial(Stage::ExtractingText, 4, 4);
        assert_eq!(rx.borrow().percent, 20);
        reporter.partial(Stage::RankingImportance, 1, 2);
        assert_eq!(rx.borrow().percent, 70);
    }

    #[test]
    fn test_partial_ignores_empty_work() {
        let (reporter, rx) = ProgressReporter::new();
        reporter.partial(Stage::ExtractingText, 0, 0);
        assert_eq!(*rx.borrow(), Progress::initial());
    }

    #[test]
    fn test_detached_reporter_still_tracks_current() {
        let reporter = ProgressReporter::detached();
        reporter.complete(Stage::GeneratingAnalysis);
        assert!(reporter.current().is_complete());
    }
}
