use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Index(String),
}

impl IngestError {
    pub fn provider(context: impl Into<String>, source: impl Into<ProviderError>) -> Self {
        Self::Provider {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T, IngestError>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ProviderError>,
{
    fn context(self, context: &str) -> Result<T, IngestError> {
        self.map_err(|error| IngestError::provider(context, error))
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
