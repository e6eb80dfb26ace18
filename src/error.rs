use std::{
    io
    , path::PathBuf
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsiError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration key `{key}`: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("{path}: not a usable HEALPix FITS file: {reason}")]
    Fits { path: PathBuf, reason: String },

    #[error("{path}: {source}")]
    Fitsio {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Table {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid sky map: {0}")]
    Map(String),

    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl CsiError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CsiError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fitsio(path: impl Into<PathBuf>, source: fitsio::errors::Error) -> Self {
        CsiError::Fitsio {
            path: path.into(),
            source,
        }
    }

    pub fn config(key: &'static str, reason: impl Into<String>) -> Self {
        CsiError::Config {
            key,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CsiError>;
