use crate::chunking::split_into_chunks;
use crate::config::PipelineConfig;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::loader::load_documents;
use crate::models::{LoadReport, SkippedPdf};
use crate::store::{self, BuildOutcome, VectorStore};
use tracing::{error, info, info_span, Span};

pub struct IngestionPipeline<X, E>
where
    X: PdfExtractor,
    E: Embedder,
{
    config: PipelineConfig,
    extractor: X,
    embedder: E,
    span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub pdf_files: usize,
    pub documents: usize,
    pub chunks: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    /// No document text was loaded, either because the directory has no PDFs
    /// or because none of them could be read. Nothing was persisted.
    NoDocuments { skipped: Vec<SkippedPdf> },
    NothingToIndex { summary: RunSummary },
    Indexed {
        store: VectorStore,
        summary: RunSummary,
        skipped: Vec<SkippedPdf>,
    },
}

impl<X, E> IngestionPipeline<X, E>
where
    X: PdfExtractor,
    E: Embedder,
{
    pub fn new(config: PipelineConfig, extractor: X, embedder: E) -> Result<Self, IngestError> {
        config.validate()?;
        let span = info_span!(
            "ingest",
            data_path = %config.data_path.display(),
            index_path = %config.index_path.display()
        );

        Ok(Self {
            config,
            extractor,
            embedder,
            span,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn run(&self) -> Result<PipelineOutcome, IngestError> {
        let _entered = self.span.enter();
        info!("processing and storing pdfs");

        let report = load_documents(&self.config.data_path, self.config.recursive, &self.extractor)
            .inspect_err(|error| error!(%error, "error loading pdf files"))?;
        let LoadReport {
            pdf_files,
            documents,
            skipped_files,
        } = report;

        let chunks = match split_into_chunks(&documents, self.config.chunking) {
            Ok(chunks) => chunks,
            Err(error @ IngestError::Data(_)) => {
                error!(%error, "failed to create text chunks");
                return Ok(PipelineOutcome::NoDocuments {
                    skipped: skipped_files,
                });
            }
            Err(error) => {
                error!(%error, "failed to create text chunks");
                return Err(error);
            }
        };

        let summary = RunSummary {
            pdf_files,
            documents: documents.len(),
            chunks: chunks.len(),
            skipped: skipped_files.len(),
        };

        match store::build_and_persist(&chunks, &self.config.index_path, &self.embedder)? {
            BuildOutcome::NothingToIndex => Ok(PipelineOutcome::NothingToIndex { summary }),
            BuildOutcome::Persisted(store) => {
                info!(
                    pdf_files = summary.pdf_files,
                    documents = summary.documents,
                    chunks = summary.chunks,
                    skipped = summary.skipped,
                    "vector store created successfully"
                );
                Ok(PipelineOutcome::Indexed {
                    store,
                    summary,
                    skipped: skipped_files,
                })
            }
        }
    }

    pub fn load_store(&self) -> Result<Option<VectorStore>, IngestError> {
        let _entered = self.span.enter();
        store::load(&self.config.index_path, &self.embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ProviderError;
    use crate::extractor::LopdfExtractor;
    use crate::test_support::write_text_pdf;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    struct OfflineEmbedder;

    impl Embedder for OfflineEmbedder {
        fn model_name(&self) -> &str {
            "offline"
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        fn embed_documents(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Embedding("connection refused".to_string()))
        }
    }

    fn config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            data_path: root.join("data"),
            index_path: root.join("vectorstore").join("db"),
            chunking: ChunkingConfig {
                chunk_size: 60,
                chunk_overlap: 10,
            },
            recursive: false,
        }
    }

    fn write_manuals(data: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(data)?;
        write_text_pdf(
            &data.join("pump.pdf"),
            &[
                &[
                    "Check the hydraulic oil level before every start.",
                    "Top up with the grade printed on the tank label.",
                ],
                &["Replace the intake filter after two hundred hours of use."],
            ],
        )?;
        write_text_pdf(
            &data.join("valve.pdf"),
            &[&["Torque the flange bolts in a star pattern."]],
        )?;
        Ok(())
    }

    #[test]
    fn full_run_persists_a_queryable_store() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = config(dir.path());
        write_manuals(&config.data_path)?;

        let pipeline =
            IngestionPipeline::new(config.clone(), LopdfExtractor, CharacterNgramEmbedder::default())?;
        let outcome = pipeline.run()?;

        let (store, summary, skipped) = match outcome {
            PipelineOutcome::Indexed {
                store,
                summary,
                skipped,
            } => (store, summary, skipped),
            other => panic!("expected an indexed outcome, got {other:?}"),
        };
        assert_eq!(summary.pdf_files, 2);
        assert_eq!(summary.documents, 3);
        assert!(summary.chunks >= 3);
        assert_eq!(summary.chunks, store.len());
        assert!(skipped.is_empty());
        assert!(config.index_path.join(crate::store::MANIFEST_FILE).exists());

        let reloaded = pipeline.load_store()?.ok_or("store should reload")?;
        assert_eq!(reloaded.len(), store.len());

        let hits = reloaded.similarity_search("intake filter", pipeline.embedder(), 1)?;
        assert_eq!(hits[0].chunk.metadata.title, "pump.pdf");
        assert_eq!(hits[0].chunk.metadata.page, 2);
        Ok(())
    }

    #[test]
    fn empty_data_directory_indexes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = config(dir.path());
        fs::create_dir_all(&config.data_path)?;

        let pipeline =
            IngestionPipeline::new(config.clone(), LopdfExtractor, CharacterNgramEmbedder::default())?;
        let outcome = pipeline.run()?;

        assert!(matches!(outcome, PipelineOutcome::NoDocuments { ref skipped } if skipped.is_empty()));
        assert!(!config.index_path.exists());
        assert!(pipeline.load_store()?.is_none());
        Ok(())
    }

    #[test]
    fn unreadable_pdfs_only_is_distinguishable_from_empty() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let config = config(dir.path());
        fs::create_dir_all(&config.data_path)?;
        fs::write(config.data_path.join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let pipeline =
            IngestionPipeline::new(config.clone(), LopdfExtractor, CharacterNgramEmbedder::default())?;
        let outcome = pipeline.run()?;

        match outcome {
            PipelineOutcome::NoDocuments { skipped } => assert_eq!(skipped.len(), 1),
            other => panic!("expected no documents, got {other:?}"),
        }
        assert!(!config.index_path.exists());
        Ok(())
    }

    #[test]
    fn missing_data_directory_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;

        let pipeline = IngestionPipeline::new(
            config(dir.path()),
            LopdfExtractor,
            CharacterNgramEmbedder::default(),
        )?;

        assert!(matches!(pipeline.run(), Err(IngestError::Configuration(_))));
        Ok(())
    }

    #[test]
    fn embedding_failure_is_returned_and_nothing_is_written(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = config(dir.path());
        write_manuals(&config.data_path)?;

        let pipeline = IngestionPipeline::new(config.clone(), LopdfExtractor, OfflineEmbedder)?;

        assert!(matches!(pipeline.run(), Err(IngestError::Provider { .. })));
        assert!(!config.index_path.exists());
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = PipelineConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;

        let result = IngestionPipeline::new(config, LopdfExtractor, CharacterNgramEmbedder::default());

        assert!(matches!(result, Err(IngestError::Configuration(_))));
    }
}
