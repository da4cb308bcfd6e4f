use thiserror::Error;

/// Errors that can occur while generating datasets.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader/writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// XML writer error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid or contradictory configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed line in an input file.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A triple with a malformed or empty field.
    #[error("Invalid triple: {0}")]
    InvalidTriple(String),

    /// An evaluation split references an entity never seen in training.
    #[error("Entity {entity} appears in {split} but not in train")]
    ColdStartEntity { split: String, entity: String },

    /// A negatives generator failed.
    #[error("Generator {generator} failed on {triple}: {message}")]
    Generator {
        generator: String,
        triple: String,
        message: String,
    },

    /// A fatal error raised inside a pipeline stage.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the name of the pipeline stage that raised this error.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for lattix-datagen.
pub type Result<T> = std::result::Result<T, Error>;
