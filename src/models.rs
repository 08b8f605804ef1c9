use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub focus: String,
}

impl Persona {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn with_expertise(mut self, expertise: impl Into<String>) -> Self {
        self.expertise = expertise.into();
        self
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = focus.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSection {
    pub document: String,
    pub page_number: u32,
    pub section_title: String,
    pub importance_rank: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsectionAnalysis {
    pub document: String,
    pub page_number: u32,
    pub refined_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub input_documents: Vec<String>,
    pub persona: Persona,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
}

impl Metadata {
    /// Metadata stamped with the current UTC time.
    pub fn now(input_documents: Vec<String>, persona: Persona, job_to_be_done: String) -> Self {
        Self {
            input_documents,
            persona,
            job_to_be_done,
            processing_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub metadata: Metadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<SubsectionAnalysis>,
}

impl AnalysisResult {
    /// Checks that importance ranks are exactly `1..=N`, in order, and that
    /// every page number is positive.
    pub fn check_ranks(&self) -> Result<(), String> {
        for (i, section) in self.extracted_sections.iter().enumerate() {
            let expected = (i + 1) as u32;
            if section.importance_rank != expected {
                return Err(format!(
                    "section '{}' has rank {} at position {}",
                    section.section_title, section.importance_rank, expected
                ));
            }
            if section.page_number == 0 {
                return Err(format!("section '{}' has page 0", section.section_title));
            }
        }
        if let Some(sub) = self.subsection_analysis.iter().find(|s| s.page_number == 0) {
            return Err(format!("subsection analysis of '{}' has page 0", sub.document));
        }
        Ok(())
    }

    /// Whether every subsection analysis points at a page that also appears
    /// in the extracted sections of the same document.
    pub fn subsections_reference_sections(&self) -> bool {
        self.subsection_analysis.iter().all(|sub| {
            self.extracted_sections
                .iter()
                .any(|s| s.document == sub.document && s.page_number == sub.page_number)
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeInfo {
    pub challenge_id: String,
    pub test_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobToBeDone {
    pub task: String,
}

/// Input manifest read by the CLI; PDFs live in `pdfs/` next to it.
#[derive(Debug, Serialize, Deserialize)]
pub struct InputManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_info: Option<ChallengeInfo>,
    pub documents: Vec<ManifestDocument>,
    pub persona: Persona,
    pub job_to_be_done: JobToBeDone,
}
