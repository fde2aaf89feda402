use thiserror::Error;

#[derive(Error, Debug)]
pub enum BgcError {
    /// A structurally malformed annotation or feature row. Recovered per row.
    #[error("Malformed row at line {line} of {path}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("No valid rows found in {path} ({skipped} malformed rows skipped)")]
    NoValidRows { path: String, skipped: usize },

    /// A domain hit naming a protein absent from the resolved gene order.
    #[error("Domain hit {accession} references unknown protein {protein_id}")]
    ReferenceMismatch {
        protein_id: String,
        accession: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sequence parsing error in {path}: {message}")]
    Sequence { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl BgcError {
    pub fn configuration<S: Into<String>>(message: S) -> BgcError {
        BgcError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BgcError>;
