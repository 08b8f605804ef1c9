use std::io::Write;
use std::process::Command;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use pdf::content::{Content, Op, TextDrawAdjusted};
use pdf::file::FileOptions;
use pdf::object::Resolve;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::EngineFailure;
use crate::utils::preview;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\u{a0}]+").unwrap());

/// Text of one page, with lines preserved so heading detection can work
/// line by line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Turns raw PDF bytes into per-page text.
#[derive(Debug, Clone)]
pub struct PdfProcessor {
    ocr_fallback: bool,
}

impl PdfProcessor {
    pub fn new(ocr_fallback: bool) -> Self {
        Self { ocr_fallback }
    }

    /// Extracts page texts from `bytes`. Pages with no text are skipped, so an
    /// image-only PDF yields an empty list rather than an error when the
    /// fallback also finds nothing. A file that cannot be parsed at all is an
    /// unreadable document.
    pub fn extract_pages(&self, name: &str, bytes: &[u8]) -> Result<Vec<PageText>, EngineFailure> {
        if !has_pdf_header(bytes) {
            return Err(EngineFailure::UnreadableDocument {
                document: name.to_string(),
                reason: "missing %PDF- header".to_string(),
            });
        }

        let parse_error = match Self::extract_pdf_text(bytes) {
            Ok(pages) if !pages.is_empty() => return Ok(pages),
            Ok(_) => {
                info!(document = name, "no text extracted via PDF parsing");
                None
            }
            Err(e) => {
                warn!(document = name, error = %e, "PDF parsing failed");
                Some(e)
            }
        };

        if self.ocr_fallback {
            match Self::extract_with_ocr(bytes) {
                Ok(pages) => {
                    info!(document = name, pages = pages.len(), "using pdftotext-extracted text");
                    return Ok(pages);
                }
                Err(ocr_err) => {
                    warn!(document = name, error = %ocr_err, "pdftotext fallback failed");
                }
            }
        }

        match parse_error {
            Some(e) => Err(EngineFailure::UnreadableDocument {
                document: name.to_string(),
                reason: format!("{e:#}"),
            }),
            None => Ok(Vec::new()),
        }
    }

    fn extract_pdf_text(bytes: &[u8]) -> Result<Vec<PageText>> {
        let file = FileOptions::cached()
            .load(bytes.to_vec())
            .context("Failed to parse PDF structure")?;
        let resolver = &file;
        let total_pages = file.num_pages();
        debug!(total_pages, "opened PDF");

        let mut page_texts = Vec::new();
        for page_index in 0..total_pages {
            let number = page_index + 1;
            let page = match file.get_page(page_index) {
                Ok(page) => page,
                Err(e) => {
                    warn!(page = number, error = %e, "failed to load page");
                    continue;
                }
            };

            let mut raw = String::new();
            if let Some(content) = &page.contents {
                if let Err(e) = Self::extract_text_from_content(resolver, content, &mut raw) {
                    warn!(page = number, error = %e, "failed to decode page content");
                }
            }

            let cleaned = clean_extracted_text(&raw);
            if cleaned.is_empty() {
                debug!(page = number, "no text on page");
                continue;
            }
            debug!(page = number, chars = cleaned.len(), preview = %preview(&cleaned, 100), "extracted page");
            page_texts.push(PageText {
                number,
                text: cleaned,
            });
        }
        Ok(page_texts)
    }

    fn extract_text_from_content(
        resolver: &impl Resolve,
        content: &Content,
        text: &mut String,
    ) -> Result<()> {
        for op in content.operations(resolver)? {
            match op {
                Op::TextDraw { text: t } => {
                    let text_str = t.to_string_lossy();
                    if !text_str.trim().is_empty() {
                        text.push_str(&text_str);
                        text.push(' ');
                    }
                }
                Op::TextDrawAdjusted { array } => {
                    for item in array {
                        match item {
                            TextDrawAdjusted::Text(text_str) => {
                                let text_content = text_str.to_string_lossy();
                                if !text_content.trim().is_empty() {
                                    text.push_str(&text_content);
                                }
                            }
                            // Large negative kerning separates words.
                            TextDrawAdjusted::Spacing(gap) => {
                                if gap < -200.0 {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                    text.push(' ');
                }
                Op::TextNewline => text.push('\n'),
                Op::MoveTextPosition { translation } => {
                    if translation.y.abs() > 0.5 {
                        text.push('\n');
                    }
                }
                Op::EndText => text.push('\n'),
                _ => {}
            }
        }
        Ok(())
    }

    fn extract_with_ocr(bytes: &[u8]) -> Result<Vec<PageText>> {
        let mut tmp = tempfile::Builder::new()
            .prefix("docintel-")
            .suffix(".pdf")
            .tempfile()
            .context("Failed to create temporary file for pdftotext")?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(tmp.path())
            .arg("-")
            .output()
            .context("Failed to execute pdftotext. Is poppler-utils installed?")?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "pdftotext failed with status: {}\nError: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let text = String::from_utf8(output.stdout).context("pdftotext output not valid UTF-8")?;
        let pages = split_form_feed_pages(&text);
        if pages.is_empty() {
            return Err(anyhow::anyhow!("pdftotext extracted no text"));
        }
        Ok(pages)
    }
}

/// The header may be preceded by junk but must sit in the first kilobyte.
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Normalises whitespace inside each line and drops blank lines.
pub fn clean_extracted_text(raw_text: &str) -> String {
    raw_text
        .lines()
        .map(|line| WHITESPACE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `pdftotext` separates pages with form feeds.
fn split_form_feed_pages(text: &str) -> Vec<PageText> {
    text.split('\u{c}')
        .enumerate()
        .filter_map(|(i, page)| {
            let cleaned = clean_extracted_text(page);
            (!cleaned.is_empty()).then(|| PageText {
                number: (i + 1) as u32,
                text: cleaned,
            })
        })
        .collect()
}

/// Builds an uncompressed PDF with one text line per entry, one page per
/// outer slice.
#[cfg(test)]
pub(crate) fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let first_page = 3;
    let first_content = first_page + pages.len();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages.len())
                .map(|i| format!("{} 0 R", first_page + i))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
    ];
    for i in 0..pages.len() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents {} 0 R >>",
            first_content + i
        ));
    }
    for lines in pages {
        let mut stream = String::from("BT\n/F1 12 Tf\n72 720 Td\n");
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                stream.push_str("0 -16 Td\n");
            }
            stream.push_str(&format!("({line}) Tj\n"));
        }
        stream.push_str("ET");
        objects.push(format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}
