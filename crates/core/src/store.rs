use crate::embeddings::Embedder;
use crate::error::{IngestError, ProviderError, ResultExt};
use crate::models::{Chunk, SearchHit};
use crate::stores::FlatIndex;
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

const CREATE_CONTEXT: &str = "error creating vector store";
const LOAD_CONTEXT: &str = "error loading vector store";
const SEARCH_CONTEXT: &str = "error searching vector store";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub index_id: Uuid,
    pub model: String,
    pub dimensions: usize,
    pub metric: String,
    pub count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct VectorStore {
    manifest: IndexManifest,
    index: FlatIndex,
}

#[derive(Debug)]
pub enum BuildOutcome {
    NothingToIndex,
    Persisted(VectorStore),
}

impl BuildOutcome {
    pub fn into_store(self) -> Option<VectorStore> {
        match self {
            Self::NothingToIndex => None,
            Self::Persisted(store) => Some(store),
        }
    }
}

impl VectorStore {
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.index.chunks()
    }

    pub fn search_by_vector(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IngestError> {
        self.index.search(vector, top_k).context(SEARCH_CONTEXT)
    }

    pub fn similarity_search<E>(
        &self,
        query: &str,
        embedder: &E,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IngestError>
    where
        E: Embedder + ?Sized,
    {
        let vector = embedder.embed_query(query).context(SEARCH_CONTEXT)?;
        self.search_by_vector(&vector, top_k)
    }

    pub fn persist(&self, path: &Path) -> Result<(), IngestError> {
        write_bundle(&self.index, &self.manifest, path).context(CREATE_CONTEXT)
    }
}

pub fn build_and_persist<E>(
    chunks: &[Chunk],
    storage_path: &Path,
    embedder: &E,
) -> Result<BuildOutcome, IngestError>
where
    E: Embedder + ?Sized,
{
    if chunks.is_empty() {
        warn!("no text chunks to save");
        return Ok(BuildOutcome::NothingToIndex);
    }

    info!(
        chunks = chunks.len(),
        model = embedder.model_name(),
        "creating vector store"
    );

    let store = build(chunks, embedder)
        .inspect_err(|error| error!(%error, "vector store build failed"))?;
    info!(vectors = store.len(), "vector store created");

    store
        .persist(storage_path)
        .inspect_err(|error| {
            error!(%error, path = %storage_path.display(), "vector store not saved")
        })?;
    info!(path = %storage_path.display(), "vector store saved");

    Ok(BuildOutcome::Persisted(store))
}

fn build<E>(chunks: &[Chunk], embedder: &E) -> Result<VectorStore, IngestError>
where
    E: Embedder + ?Sized,
{
    let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
    let embeddings = embedder.embed_documents(&texts).context(CREATE_CONTEXT)?;

    let dimensions = embeddings
        .first()
        .map(Vec::len)
        .or_else(|| embedder.dimensions())
        .unwrap_or(0);
    if dimensions == 0 {
        return Err(IngestError::provider(
            CREATE_CONTEXT,
            ProviderError::Embedding("embedding provider returned empty vectors".to_string()),
        ));
    }
    if let Some(declared) = embedder.dimensions() {
        if declared != dimensions {
            return Err(IngestError::provider(
                CREATE_CONTEXT,
                ProviderError::Embedding(format!(
                    "model {} declares {declared} dimensions but returned {dimensions}",
                    embedder.model_name()
                )),
            ));
        }
    }

    let mut index = FlatIndex::new(dimensions);
    index
        .add(chunks.to_vec(), embeddings)
        .context(CREATE_CONTEXT)?;

    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        index_id: Uuid::new_v4(),
        model: embedder.model_name().to_string(),
        dimensions,
        metric: "l2".to_string(),
        count: index.len(),
        built_at: Utc::now(),
    };

    Ok(VectorStore { manifest, index })
}

/// Returns `Ok(None)` when `storage_path` holds no manifest, including when it is
/// missing or an empty directory.
pub fn load<E>(storage_path: &Path, embedder: &E) -> Result<Option<VectorStore>, IngestError>
where
    E: Embedder + ?Sized,
{
    if !storage_path.join(MANIFEST_FILE).is_file() {
        warn!(path = %storage_path.display(), "vector store not found");
        for backup in stranded_backups(storage_path) {
            warn!(
                path = %backup.display(),
                "a previous vector store was left beside the target by an interrupted save"
            );
        }
        return Ok(None);
    }

    info!(path = %storage_path.display(), "loading vector store");
    let store = read_bundle(storage_path, embedder).inspect_err(|error| {
        error!(%error, path = %storage_path.display(), "vector store not loaded")
    })?;
    info!(
        vectors = store.len(),
        model = %store.manifest.model,
        "vector store loaded"
    );

    Ok(Some(store))
}

fn read_bundle<E>(storage_path: &Path, embedder: &E) -> Result<VectorStore, IngestError>
where
    E: Embedder + ?Sized,
{
    let manifest = read_manifest(storage_path).context(LOAD_CONTEXT)?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(IngestError::provider(
            LOAD_CONTEXT,
            ProviderError::Index(format!(
                "unsupported store format version {}",
                manifest.format_version
            )),
        ));
    }

    if let Some(dimensions) = embedder.dimensions() {
        if dimensions != manifest.dimensions {
            return Err(IngestError::Configuration(format!(
                "store at {} holds {}-dimension vectors from {} but the embedder produces {dimensions}",
                storage_path.display(),
                manifest.dimensions,
                manifest.model
            )));
        }
    }
    if embedder.model_name() != manifest.model {
        warn!(
            stored = %manifest.model,
            current = embedder.model_name(),
            "vector store was built with a different embedding model"
        );
    }

    let index = FlatIndex::load(storage_path).context(LOAD_CONTEXT)?;
    if index.len() != manifest.count || index.dimensions() != manifest.dimensions {
        return Err(IngestError::provider(
            LOAD_CONTEXT,
            ProviderError::Index(format!(
                "manifest lists {} x {} vectors, files hold {} x {}",
                manifest.count,
                manifest.dimensions,
                index.len(),
                index.dimensions()
            )),
        ));
    }

    Ok(VectorStore { manifest, index })
}

fn backup_prefix(target: &Path) -> Option<String> {
    target
        .file_name()
        .map(|name| format!(".{}-previous-", name.to_string_lossy()))
}

fn stranded_backups(target: &Path) -> Vec<PathBuf> {
    let Some(prefix) = backup_prefix(target) else {
        return Vec::new();
    };
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut found: Vec<PathBuf> = fs::read_dir(parent)
        .map(|listing| {
            listing
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
                .map(|entry| entry.path())
                .collect()
        })
        .unwrap_or_default();
    found.sort();
    found
}

fn read_manifest(dir: &Path) -> Result<IndexManifest, ProviderError> {
    let file = File::open(dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn write_bundle(
    index: &FlatIndex,
    manifest: &IndexManifest,
    target: &Path,
) -> Result<(), ProviderError> {
    target.file_name().ok_or_else(|| {
        ProviderError::Index(format!("storage path {} has no final component", target.display()))
    })?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".vector-store-staging-")
        .tempdir_in(&parent)?;
    index.save(staging.path())?;

    let file = File::create(staging.path().join(MANIFEST_FILE))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer
        .into_inner()
        .map_err(|error| ProviderError::Io(error.into_error()))?
        .sync_all()?;

    let backup = if target.exists() {
        let backup = parent.join(format!(
            "{}{}",
            backup_prefix(target).unwrap_or_default(),
            manifest.index_id
        ));
        fs::rename(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(rename_error) = fs::rename(staging.path(), target) {
        if let Some(backup) = &backup {
            if let Err(restore_error) = fs::rename(backup, target) {
                error!(
                    backup = %backup.display(),
                    %restore_error,
                    "previous vector store could not be restored"
                );
            }
        }
        return Err(rename_error.into());
    }

    if let Some(backup) = backup {
        let removed = if backup.is_dir() {
            fs::remove_dir_all(&backup)
        } else {
            fs::remove_file(&backup)
        };
        if let Err(error) = removed {
            warn!(path = %backup.display(), %error, "previous vector store left behind");
        }
    }

    Ok(())
}
