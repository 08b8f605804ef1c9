//! One user's analysis session: the documents, persona and job being
//! assembled, and at most one run in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{run_analysis, AnalysisEngine, RunContext};
use crate::errors::{AnalysisError, EngineFailure, RequestError};
use crate::models::{AnalysisResult, Persona};
use crate::progress::{Progress, ProgressReporter};
use crate::request::{AnalysisRequest, Document, MAX_DOCUMENTS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed(AnalysisResult),
    Failed(AnalysisError),
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed(_) | SessionState::Failed(_) | SessionState::Cancelled
        )
    }
}

struct InFlight {
    cancel: CancellationToken,
    progress: watch::Receiver<Progress>,
    handle: JoinHandle<Result<AnalysisResult, AnalysisError>>,
}

pub struct AnalysisSession {
    documents: Vec<Document>,
    persona: Persona,
    job: String,
    timeout: Duration,
    state: SessionState,
    last_progress: Progress,
    in_flight: Option<InFlight>,
}

impl AnalysisSession {
    pub fn new(timeout: Duration) -> Self {
        Self {
            documents: Vec::new(),
            persona: Persona::default(),
            job: String::new(),
            timeout,
            state: SessionState::Idle,
            last_progress: Progress::initial(),
            in_flight: None,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Adds `files` as a batch. A batch with any non-PDF file, or one that
    /// would take the set past the cap, is rejected as a whole.
    pub fn add_documents(&mut self, files: Vec<Document>) -> Result<(), RequestError> {
        for file in &files {
            file.ensure_pdf()?;
        }
        let count = self.documents.len() + files.len();
        if count > MAX_DOCUMENTS {
            return Err(RequestError::TooManyDocuments {
                count,
                max: MAX_DOCUMENTS,
            });
        }
        self.documents.extend(files);
        Ok(())
    }

    pub fn remove_document(&mut self, index: usize) -> Result<Document, RequestError> {
        if index >= self.documents.len() {
            return Err(RequestError::DocumentIndexOutOfRange { index });
        }
        Ok(self.documents.remove(index))
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn set_job(&mut self, job: impl Into<String>) {
        self.job = job.into();
    }

    pub fn build_request(&self) -> Result<AnalysisRequest, RequestError> {
        AnalysisRequest::new(self.documents.clone(), self.persona.clone(), self.job.clone())
    }

    pub fn is_running(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    pub fn can_analyze(&self) -> bool {
        !self.is_running() && self.build_request().is_ok()
    }

    /// Validates the current inputs and starts a run on the tokio runtime.
    /// Nothing reaches `engine` unless validation passes. A finished run that
    /// was never collected is discarded.
    pub fn start(
        &mut self,
        engine: Arc<dyn AnalysisEngine>,
    ) -> Result<watch::Receiver<Progress>, AnalysisError> {
        if self.is_running() {
            return Err(AnalysisError::Busy);
        }
        let request = self.build_request()?;

        let (reporter, progress) = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let ctx = RunContext::new(reporter, cancel.clone());
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            run_analysis(engine.as_ref(), request, ctx, timeout).await
        });

        info!(documents = self.documents.len(), "analysis started");
        self.state = SessionState::Running;
        self.last_progress = Progress::initial();
        self.in_flight = Some(InFlight {
            cancel,
            progress: progress.clone(),
            handle,
        });
        Ok(progress)
    }

    /// Latest progress of the current or most recent run.
    pub fn progress(&self) -> Progress {
        match &self.in_flight {
            Some(run) => *run.progress.borrow(),
            None => self.last_progress,
        }
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<Progress>> {
        self.in_flight.as_ref().map(|run| run.progress.clone())
    }

    /// Cancels the run in flight, if any, and waits for it to stop.
    pub async fn cancel(&mut self) -> &SessionState {
        if let Some(run) = &self.in_flight {
            info!("cancelling analysis");
            run.cancel.cancel();
        }
        self.wait().await
    }

    /// Waits for the run in flight to reach a terminal state.
    pub async fn wait(&mut self) -> &SessionState {
        if let Some(InFlight {
            progress, handle, ..
        }) = self.in_flight.take()
        {
            let outcome = handle.await;
            self.last_progress = *progress.borrow();
            self.state = match outcome {
                Ok(Ok(result)) => SessionState::Completed(result),
                Ok(Err(AnalysisError::Cancelled)) => SessionState::Cancelled,
                Ok(Err(e)) => SessionState::Failed(e),
                Err(join_err) => {
                    warn!(error = %join_err, "analysis task ended abnormally");
                    SessionState::Failed(
                        EngineFailure::Internal(format!("analysis task failed: {join_err}")).into(),
                    )
                }
            };
        }
        &self.state
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            SessionState::Completed(result) => Some(result),
            _ => None,
        }
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        if let Some(run) = &self.in_flight {
            run.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pdf(name: &str) -> Document {
        Document::new(name, b"%PDF-1.4\n".to_vec())
    }

    fn simulated() -> Arc<dyn AnalysisEngine> {
        Arc::new(SimulatedEngine::new(Duration::from_secs(1)))
    }

    fn ready_session() -> AnalysisSession {
        let mut session = AnalysisSession::new(Duration::from_secs(60));
        session.add_documents(vec![pdf("A.pdf"), pdf("B.pdf")]).unwrap();
        session.set_persona(Persona::new("Analyst"));
        session.set_job("Summarize");
        session
    }

    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisEngine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn analyze(
            &self,
            _request: AnalysisRequest,
            _ctx: &RunContext,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineFailure::Internal("should not run".into()).into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_documents_complete_with_sections() {
        let mut session = ready_session();
        assert!(session.can_analyze());

        let mut rx = session.start(simulated()).unwrap();
        let observer = tokio::spawn(async move {
            let mut seen = vec![rx.borrow().percent];
            while rx.changed().await.is_ok() {
                seen.push(rx.borrow_and_update().percent);
            }
            seen
        });

        let result = match session.wait().await {
            SessionState::Completed(result) => result.clone(),
            other => panic!("expected completion, got {other:?}"),
        };
        drop(session);
        let seen = observer.await.unwrap();

        assert_eq!(result.metadata.input_documents, vec!["A.pdf", "B.pdf"]);
        assert!(!result.extracted_sections.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_single_document_rejected_without_engine_call() {
        let mut session = AnalysisSession::new(Duration::from_secs(60));
        session.add_documents(vec![pdf("A.pdf")]).unwrap();
        session.set_persona(Persona::new("Analyst"));
        session.set_job("Summarize");
        assert!(!session.can_analyze());

        let engine = Arc::new(CountingEngine::default());
        let err = session.start(engine.clone()).unwrap_err();

        assert_eq!(
            err,
            AnalysisError::InvalidRequest(RequestError::TooFewDocuments { count: 1, min: 2 })
        );
        tokio::task::yield_now().await;
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_missing_role_or_job_rejected() {
        let mut session = ready_session();
        session.set_persona(Persona::new(""));
        assert_eq!(
            session.start(simulated()).unwrap_err(),
            AnalysisError::InvalidRequest(RequestError::MissingRole)
        );
        session.set_persona(Persona::new("Analyst"));
        session.set_job("   ");
        assert_eq!(
            session.start(simulated()).unwrap_err(),
            AnalysisError::InvalidRequest(RequestError::MissingJob)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_releases_documents() {
        let mut session = ready_session();
        let content = Arc::clone(&session.documents()[0].content);
        let baseline = Arc::strong_count(&content);

        let mut rx = session.start(simulated()).unwrap();
        rx.wait_for(|p| p.percent >= 40).await.unwrap();
        assert!(session.is_running());
        assert!(Arc::strong_count(&content) > baseline);

        let state = session.cancel().await.clone();

        assert_eq!(state, SessionState::Cancelled);
        assert!(session.result().is_none());
        assert!(!session.is_running());
        assert_eq!(session.progress().percent, 40);
        assert_eq!(Arc::strong_count(&content), baseline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_running_is_busy() {
        let mut session = ready_session();
        session.start(simulated()).unwrap();
        assert_eq!(session.start(simulated()).unwrap_err(), AnalysisError::Busy);
        assert!(!session.can_analyze());

        session.cancel().await;
        session.start(simulated()).unwrap();
        assert!(matches!(session.wait().await, SessionState::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let mut session = AnalysisSession::new(Duration::from_millis(2500));
        session.add_documents(vec![pdf("A.pdf"), pdf("B.pdf")]).unwrap();
        session.set_persona(Persona::new("Analyst"));
        session.set_job("Summarize");

        session.start(simulated()).unwrap();
        match session.wait().await {
            SessionState::Failed(err) => {
                assert_eq!(err.kind(), "TIMEOUT");
                assert!(err.user_message().contains("2.5 seconds"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_add_documents_reports_rejections() {
        let mut session = AnalysisSession::new(Duration::from_secs(60));
        let err = session
            .add_documents(vec![pdf("a.pdf"), Document::new("photo.png", vec![0u8; 4])])
            .unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedFileType { ref name, .. } if name == "photo.png"));
        assert!(session.documents().is_empty());

        session
            .add_documents((0..9).map(|i| pdf(&format!("{i}.pdf"))).collect())
            .unwrap();
        assert_eq!(
            session.add_documents(vec![pdf("x.pdf"), pdf("y.pdf")]).unwrap_err(),
            RequestError::TooManyDocuments { count: 11, max: 10 }
        );
        assert_eq!(session.documents().len(), 9);
        session.add_documents(vec![pdf("x.pdf")]).unwrap();
        assert_eq!(session.documents().len(), 10);
    }

    #[test]
    fn test_remove_document() {
        let mut session = ready_session();
        assert_eq!(session.remove_document(0).unwrap().name, "A.pdf");
        assert_eq!(session.documents()[0].name, "B.pdf");
        assert_eq!(
            session.remove_document(5).unwrap_err(),
            RequestError::DocumentIndexOutOfRange { index: 5 }
        );
    }
}
