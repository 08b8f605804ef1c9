use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::models::AnalysisResult;
use crate::utils::ensure_directory_exists;

/// Pretty JSON with two-space indentation.
pub fn to_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

pub fn from_json(raw: &str) -> serde_json::Result<AnalysisResult> {
    serde_json::from_str(raw)
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("document-analysis-{}.json", date.format("%Y-%m-%d"))
}

pub fn default_export_filename() -> String {
    export_filename(Utc::now().date_naive())
}

pub fn write_export(result: &AnalysisResult, path: &Path) -> Result<()> {
    let json = to_json(result).context("Failed to serialize analysis result")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output to {}", path.display()))
}

/// Writes the result into `dir` under today's export filename.
pub fn write_export_to_dir(result: &AnalysisResult, dir: &Path) -> Result<PathBuf> {
    ensure_directory_exists(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(default_export_filename());
    write_export(result, &path)?;
    Ok(path)
}

pub fn read_export(path: &Path) -> Result<AnalysisResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read export at {}", path.display()))?;
    from_json(&raw).with_context(|| format!("Failed to parse export at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedSection, Metadata, Persona, SubsectionAnalysis};

    fn sample() -> AnalysisResult {
        AnalysisResult {
            metadata: Metadata::now(
                vec!["A.pdf".into(), "B.pdf".into()],
                Persona::new("Investment Analyst")
                    .with_expertise("Equity research, \"tech\" sector")
                    .with_focus("R&D spend, 5y trends"),
                "Analyze revenue trends".into(),
            ),
            extracted_sections: vec![ExtractedSection {
                document: "A.pdf".into(),
                page_number: 4,
                section_title: "Revenue".into(),
                importance_rank: 1,
                content: "Revenue grew 12%.\nMargins held.".into(),
            }],
            subsection_analysis: vec![SubsectionAnalysis {
                document: "A.pdf".into(),
                page_number: 4,
                refined_text: "Revenue grew 12%.".into(),
            }],
        }
    }

    #[test]
    fn test_export_parses_back_to_equal_value() {
        let result = sample();
        let json = to_json(&result).unwrap();
        assert_eq!(from_json(&json).unwrap(), result);
        assert_eq!(to_json(&from_json(&json).unwrap()).unwrap(), json);
    }

    #[test]
    fn test_export_layout() {
        let json = to_json(&sample()).unwrap();
        assert!(json.starts_with("{\n  \"metadata\": {\n    \"input_documents\": ["));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["persona"]["role"], "Investment Analyst");
        assert_eq!(value["metadata"]["job_to_be_done"], "Analyze revenue trends");
        assert_eq!(value["extracted_sections"][0]["importance_rank"], 1);
        assert_eq!(value["subsection_analysis"][0]["page_number"], 4);
    }

    #[test]
    fn test_filename_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_filename(date), "document-analysis-2024-03-07.json");
        assert!(default_export_filename().starts_with("document-analysis-20"));
    }

    #[test]
    fn test_write_and_read_export() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample();
        let path = write_export_to_dir(&result, &dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap().to_string_lossy(), default_export_filename());
        assert_eq!(read_export(&path).unwrap(), result);
    }
}
