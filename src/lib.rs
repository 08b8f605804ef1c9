pub mod collection;
pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod models;
pub mod pdf_processor;
pub mod progress;
pub mod ranking;
pub mod refine;
pub mod request;
pub mod sections;
pub mod session;
pub mod utils;

pub use engine::{run_analysis, AnalysisEngine, PdfEngine, RunContext, SimulatedEngine};
pub use errors::{AnalysisError, EngineFailure, RequestError};
pub use models::{AnalysisResult, ExtractedSection, Metadata, Persona, SubsectionAnalysis};
pub use progress::{Progress, ProgressReporter, Stage};
pub use request::{AnalysisRequest, Document};
pub use session::{AnalysisSession, SessionState};
