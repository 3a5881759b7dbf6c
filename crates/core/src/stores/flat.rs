use crate::error::ProviderError;
use crate::models::{Chunk, SearchHit};
use crate::traits::VectorIndex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

const MAGIC: &[u8; 4] = b"PDFV";

/// Vectors are stored row-major in one contiguous buffer; `chunks[i]` is the
/// payload of row `i`.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimensions;
        &self.vectors[start..start + self.dimensions]
    }
}

impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), ProviderError> {
        if chunks.len() != embeddings.len() {
            return Err(ProviderError::Index(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        if let Some(embedding) = embeddings
            .iter()
            .find(|embedding| embedding.len() != self.dimensions)
        {
            return Err(ProviderError::Index(format!(
                "embedding dimension {} != {}",
                embedding.len(),
                self.dimensions
            )));
        }

        self.vectors.reserve(embeddings.len() * self.dimensions);
        for embedding in embeddings {
            self.vectors.extend_from_slice(&embedding);
        }
        self.chunks.extend(chunks);
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, ProviderError> {
        if query.len() != self.dimensions {
            return Err(ProviderError::Index(format!(
                "query vector dim {} is not {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|position| (position, squared_l2(query, self.row(position))))
            .collect();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                chunk: self.chunks[position].clone(),
                distance,
            })
            .collect())
    }

    fn save(&self, dir: &Path) -> Result<(), ProviderError> {
        let file = File::create(dir.join(VECTORS_FILE))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&(self.dimensions as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer
            .into_inner()
            .map_err(|error| ProviderError::Io(error.into_error()))?
            .sync_all()?;

        let file = File::create(dir.join(CHUNKS_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.chunks)?;
        writer
            .into_inner()
            .map_err(|error| ProviderError::Io(error.into_error()))?
            .sync_all()?;

        Ok(())
    }

    fn load(dir: &Path) -> Result<Self, ProviderError> {
        let mut reader = BufReader::new(File::open(dir.join(VECTORS_FILE))?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ProviderError::Index(format!(
                "{} is not a vector file",
                dir.join(VECTORS_FILE).display()
            )));
        }

        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let dimensions = u32::from_le_bytes(word) as usize;
        let mut long = [0u8; 8];
        reader.read_exact(&mut long)?;
        let count = u64::from_le_bytes(long) as usize;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let expected = count * dimensions * 4;
        if raw.len() != expected {
            return Err(ProviderError::Index(format!(
                "vector file holds {} bytes, expected {expected}",
                raw.len()
            )));
        }
        let vectors = raw
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect::<Vec<_>>();

        let chunks: Vec<Chunk> =
            serde_json::from_reader(BufReader::new(File::open(dir.join(CHUNKS_FILE))?))?;
        if chunks.len() != count {
            return Err(ProviderError::Index(format!(
                "{} chunks stored for {count} vectors",
                chunks.len()
            )));
        }

        Ok(Self {
            dimensions,
            vectors,
            chunks,
        })
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}
