use std::fmt;
use std::sync::Arc;

use crate::errors::RequestError;
use crate::models::Persona;

pub const MIN_DOCUMENTS: usize = 2;
pub const MAX_DOCUMENTS: usize = 10;

const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A named, uploaded file. The bytes are shared so that the request and
/// the run that consumes it never copy the payload.
#[derive(Clone)]
pub struct Document {
    pub name: String,
    pub content: Arc<[u8]>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Media type guessed from the file name.
    pub fn media_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string()
    }

    pub fn ensure_pdf(&self) -> Result<(), RequestError> {
        let media_type = self.media_type();
        if media_type == PDF_MEDIA_TYPE {
            Ok(())
        } else {
            Err(RequestError::UnsupportedFileType {
                name: self.name.clone(),
                media_type,
            })
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

/// A validated request. The only way to build one is [`AnalysisRequest::new`],
/// so every engine receives input that already satisfies the document count,
/// persona and job invariants.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    documents: Vec<Document>,
    persona: Persona,
    job: String,
}

impl AnalysisRequest {
    pub fn new(
        documents: Vec<Document>,
        persona: Persona,
        job: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let job = job.into();
        let count = documents.len();
        if count < MIN_DOCUMENTS {
            return Err(RequestError::TooFewDocuments {
                count,
                min: MIN_DOCUMENTS,
            });
        }
        if count > MAX_DOCUMENTS {
            return Err(RequestError::TooManyDocuments {
                count,
                max: MAX_DOCUMENTS,
            });
        }
        if persona.role.trim().is_empty() {
            return Err(RequestError::MissingRole);
        }
        if job.trim().is_empty() {
            return Err(RequestError::MissingJob);
        }
        for doc in &documents {
            doc.ensure_pdf()?;
        }
        Ok(Self {
            documents,
            persona,
            job,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }
}
