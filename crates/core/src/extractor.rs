use crate::error::ProviderError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdf {
    pub page_count: u32,
    /// Pages with readable text, in page order. Blank pages are left out.
    pub pages: Vec<PageText>,
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, ProviderError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPdf, ProviderError> {
        let document = Document::load(path).map_err(|error| {
            ProviderError::PdfParse(format!("{}: {error}", path.display()))
        })?;

        let numbered = document.get_pages();
        let page_count = numbered.len() as u32;

        let mut pages = Vec::new();
        for page_no in numbered.keys().copied() {
            let text = document.extract_text(&[page_no]).map_err(|error| {
                ProviderError::PdfParse(format!("{} page {page_no}: {error}", path.display()))
            })?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        Ok(ExtractedPdf { page_count, pages })
    }
}
