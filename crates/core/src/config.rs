use crate::chunking::ChunkingConfig;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "data/";
pub const DEFAULT_INDEX_PATH: &str = "vectorstore/db_faiss";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub index_path: PathBuf,
    pub chunking: ChunkingConfig,
    pub recursive: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            chunking: ChunkingConfig::default(),
            recursive: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.data_path.as_os_str().is_empty() {
            return Err(IngestError::Configuration("data path is empty".to_string()));
        }
        if self.index_path.as_os_str().is_empty() {
            return Err(IngestError::Configuration("index path is empty".to_string()));
        }
        if self.index_path == self.data_path {
            return Err(IngestError::Configuration(format!(
                "index path {} must differ from the data path",
                self.index_path.display()
            )));
        }
        self.chunking.validate()
    }
}
