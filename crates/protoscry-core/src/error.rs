//! Error types for the protoscry-core library.
//!
//! Only module-level failures surface here. Problems confined to a single
//! type (a missing descriptor, an unreadable tag) are degraded inside the
//! extractors and never become an [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for protoscry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all protoscry operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The metadata dump is not valid JSON or does not match the model
    #[error("failed to parse module metadata: {0}")]
    MetadataParse(#[from] serde_json::Error),

    /// Failed to decode the embedded FileDescriptorSet
    #[error("failed to parse FileDescriptorSet: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build a descriptor pool with prost-reflect
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),

    /// A declared type name could not be parsed
    #[error("invalid type name '{name}': {details}")]
    InvalidTypeName {
        /// The offending type name
        name: String,
        /// What is wrong with it
        details: String,
    },

    /// The module does not reference the runtime a convention depends on
    #[error("module '{module}' does not reference {convention} (expected one of: {expected})")]
    MissingCapability {
        /// Module name
        module: String,
        /// Convention display name
        convention: &'static str,
        /// Comma-separated list of accepted runtime assemblies
        expected: String,
    },

    /// A strategy name that matches no supported convention
    #[error("unknown mode '{name}' (expected 'google' or 'protobuf-net')")]
    UnknownStrategy {
        /// The name as given
        name: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new type name error
    pub fn invalid_type_name(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidTypeName {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Creates a new missing capability error
    pub fn missing_capability(
        module: impl Into<String>,
        convention: &'static str,
        expected: &[&str],
    ) -> Self {
        Self::MissingCapability {
            module: module.into(),
            convention,
            expected: expected.join(", "),
        }
    }

    /// Returns true if this error only concerns one module and a batch run
    /// may continue with the next one
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MetadataParse(_)
                | Self::DescriptorParse(_)
                | Self::DescriptorBuild(_)
                | Self::InvalidTypeName { .. }
                | Self::MissingCapability { .. }
        )
    }
}
