use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{AnalysisEngine, RunContext};
use crate::config::EngineConfig;
use crate::errors::{AnalysisError, EngineFailure};
use crate::models::{AnalysisResult, ExtractedSection, Metadata, SubsectionAnalysis};
use crate::pdf_processor::{PageText, PdfProcessor};
use crate::progress::Stage;
use crate::ranking::{rank_sections, QueryProfile};
use crate::refine::refine_text;
use crate::request::AnalysisRequest;
use crate::sections::identify_sections;
use crate::utils::preview;

/// Extracts text from every PDF, splits it into sections, and ranks the
/// sections against the persona and job.
#[derive(Debug, Clone)]
pub struct PdfEngine {
    processor: PdfProcessor,
    config: EngineConfig,
}

impl PdfEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            processor: PdfProcessor::new(config.ocr_fallback),
            config,
        }
    }

    /// Parses documents one at a time on the blocking pool.
    async fn extract_all(
        &self,
        request: &AnalysisRequest,
        ctx: &RunContext,
    ) -> Result<Vec<Vec<PageText>>, AnalysisError> {
        let total = request.documents().len();
        let mut pages_per_doc = Vec::with_capacity(total);
        for (i, doc) in request.documents().iter().enumerate() {
            ctx.ensure_active()?;
            let processor = self.processor.clone();
            let name = doc.name.clone();
            let content = Arc::clone(&doc.content);
            let pages = tokio::task::spawn_blocking(move || processor.extract_pages(&name, &content))
                .await
                .map_err(|e| EngineFailure::Internal(format!("text extraction task failed: {e}")))??;
            info!(document = %doc.name, pages = pages.len(), "extracted text");
            ctx.progress().partial(Stage::ExtractingText, i + 1, total);
            pages_per_doc.push(pages);
        }
        Ok(pages_per_doc)
    }

    /// Everything after extraction. Pure CPU work over already-extracted
    /// pages, checkpointing after each stage.
    pub fn analyze_pages(
        &self,
        request: &AnalysisRequest,
        pages_per_doc: &[Vec<PageText>],
        ctx: &RunContext,
    ) -> Result<AnalysisResult, AnalysisError> {
        if pages_per_doc.iter().all(Vec::is_empty) {
            return Err(EngineFailure::NoUsableContent.into());
        }
        ctx.checkpoint(Stage::ExtractingText)?;

        let profile = QueryProfile::from_request(request.persona(), request.job());
        if profile.is_empty() {
            warn!("persona and job contain no searchable terms");
        }
        ctx.checkpoint(Stage::InterpretingPersona)?;

        let sections: Vec<_> = request
            .documents()
            .iter()
            .zip(pages_per_doc)
            .enumerate()
            .flat_map(|(i, (doc, pages))| identify_sections(i, &doc.name, pages))
            .collect();
        debug!(sections = sections.len(), "identified sections");
        ctx.checkpoint(Stage::IdentifyingSections)?;

        let ranked = rank_sections(sections, &profile, self.config.max_sections)?;
        ctx.checkpoint(Stage::RankingImportance)?;

        let subsection_analysis = ranked
            .iter()
            .take(self.config.max_subsections)
            .filter_map(|r| {
                let refined_text =
                    refine_text(&r.section.content, &profile, self.config.refined_text_chars);
                (!refined_text.is_empty()).then(|| SubsectionAnalysis {
                    document: r.section.document.clone(),
                    page_number: r.section.page_number,
                    refined_text,
                })
            })
            .collect();

        let extracted_sections = ranked
            .into_iter()
            .map(|r| ExtractedSection {
                document: r.section.document,
                page_number: r.section.page_number,
                section_title: r.section.title,
                importance_rank: r.rank,
                content: preview(&r.section.content, self.config.refined_text_chars),
            })
            .collect();
        ctx.checkpoint(Stage::GeneratingAnalysis)?;

        Ok(AnalysisResult {
            metadata: Metadata::now(
                request.document_names(),
                request.persona().clone(),
                request.job().to_string(),
            ),
            extracted_sections,
            subsection_analysis,
        })
    }
}

#[async_trait]
impl AnalysisEngine for PdfEngine {
    fn name(&self) -> &'static str {
        "pdf"
    }

    async fn analyze(
        &self,
        request: AnalysisRequest,
        ctx: &RunContext,
    ) -> Result<AnalysisResult, AnalysisError> {
        let pages_per_doc = self.extract_all(&request, ctx).await?;
        self.analyze_pages(&request, &pages_per_doc, ctx)
    }
}
