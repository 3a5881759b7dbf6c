use crate::error::{IngestError, ProviderError};
use crate::extractor::PdfExtractor;
use crate::models::{Document, DocumentMetadata, LoadReport, SkippedPdf};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(folder).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, ProviderError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn load_documents<E>(
    folder: &Path,
    recursive: bool,
    extractor: &E,
) -> Result<LoadReport, IngestError>
where
    E: PdfExtractor + ?Sized,
{
    if !folder.exists() {
        return Err(IngestError::Configuration(format!(
            "data path {} does not exist",
            folder.display()
        )));
    }
    if !folder.is_dir() {
        return Err(IngestError::Configuration(format!(
            "data path {} is not a directory",
            folder.display()
        )));
    }

    info!(path = %folder.display(), recursive, "loading pdf files");

    let files = discover_pdf_files(folder, recursive);
    if files.is_empty() {
        warn!(path = %folder.display(), "no pdf files found");
        return Ok(LoadReport::default());
    }

    let cleaner = PageCleaner::new()?;
    let mut report = LoadReport {
        pdf_files: files.len(),
        ..LoadReport::default()
    };

    for path in files {
        match load_pdf(&path, extractor, &cleaner) {
            Ok(documents) => report.documents.extend(documents),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipping unreadable pdf");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    if report.documents.is_empty() {
        warn!(
            path = %folder.display(),
            pdf_files = report.pdf_files,
            "no readable text in any pdf file"
        );
    } else {
        info!(
            path = %folder.display(),
            pdf_files = report.pdf_files,
            documents = report.documents.len(),
            skipped = report.skipped_files.len(),
            "loaded pdf documents"
        );
    }

    Ok(report)
}

fn load_pdf<E>(
    path: &Path,
    extractor: &E,
    cleaner: &PageCleaner,
) -> Result<Vec<Document>, ProviderError>
where
    E: PdfExtractor + ?Sized,
{
    let checksum = digest_file(path)?;
    let extracted = extractor.extract(path)?;

    let metadata = DocumentMetadata {
        document_id: generate_document_id(path),
        source_path: path.to_string_lossy().to_string(),
        title: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string()),
        page: 0,
        page_count: extracted.page_count,
        checksum,
    };

    let documents = extracted
        .pages
        .into_iter()
        .filter_map(|page| {
            let text = cleaner.clean(&page.text);
            if text.is_empty() {
                return None;
            }
            Some(Document {
                text,
                metadata: DocumentMetadata {
                    page: page.number,
                    ..metadata.clone()
                },
            })
        })
        .collect::<Vec<_>>();

    if documents.is_empty() {
        return Err(ProviderError::PdfParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(documents)
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct PageCleaner {
    trailing_space: Regex,
    inline_space: Regex,
    blank_lines: Regex,
}

impl PageCleaner {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            trailing_space: Regex::new(r"[ \t]+\n")?,
            inline_space: Regex::new(r"[ \t]{2,}")?,
            blank_lines: Regex::new(r"\n{3,}")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let text = text
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\u{a0}', " ");
        let text = self.trailing_space.replace_all(&text, "\n");
        let text = self.inline_space.replace_all(&text, " ");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}
