//! Filesystem error types

use ossfs_client::ClientError;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, FilesystemError>;

/// Metadata attributes that can be retrieved for a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataKind {
    FileSize,
    LastModified,
    MimeType,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileSize => "file size",
            Self::LastModified => "last modified",
            Self::MimeType => "mime type",
        })
    }
}

/// Filesystem errors
///
/// Locations are the caller's paths, before the adapter prefix is applied.
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Nothing is stored at the location
    #[error("File not found at location: {location}")]
    FileNotFound { location: String },

    #[error("Unable to check existence for: {location}. {source}")]
    UnableToCheckExistence { location: String, source: ClientError },

    #[error("Unable to read file from location: {location}. {source}")]
    UnableToRead { location: String, source: ClientError },

    #[error("Unable to write file at location: {location}. {source}")]
    UnableToWrite { location: String, source: ClientError },

    #[error("Unable to delete file located at: {location}. {source}")]
    UnableToDelete { location: String, source: ClientError },

    #[error("Unable to delete directory located at: {location}. {source}")]
    UnableToDeleteDirectory { location: String, source: ClientError },

    #[error("Unable to create directory at location: {location}. {source}")]
    UnableToCreateDirectory { location: String, source: ClientError },

    #[error("Unable to list contents of: {location}. {source}")]
    UnableToList { location: String, source: ClientError },

    #[error("Unable to copy file from {from} to {to}. {source}")]
    UnableToCopy {
        from: String,
        to: String,
        source: ClientError,
    },

    /// Also raised when the copy landed but the source could not be removed
    #[error("Unable to move file from {from} to {to}. {source}")]
    UnableToMove {
        from: String,
        to: String,
        source: ClientError,
    },

    #[error("Unable to retrieve the {metadata} for file at location: {location}. {source}")]
    UnableToRetrieveMetadata {
        location: String,
        metadata: MetadataKind,
        source: ClientError,
    },

    #[error("Unable to get checksum for {location}. {source}")]
    UnableToProvideChecksum { location: String, source: ClientError },

    #[error("Unable to set visibility for file {location}. {reason}")]
    UnableToSetVisibility { location: String, reason: String },

    #[error("Unable to generate temporary url for {location}. {source}")]
    UnableToGenerateUrl { location: String, source: ClientError },
}

impl FilesystemError {
    /// Check if this is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound { .. })
    }

    /// The path the failed operation was addressed to
    pub fn location(&self) -> &str {
        match self {
            Self::FileNotFound { location }
            | Self::UnableToCheckExistence { location, .. }
            | Self::UnableToRead { location, .. }
            | Self::UnableToWrite { location, .. }
            | Self::UnableToDelete { location, .. }
            | Self::UnableToDeleteDirectory { location, .. }
            | Self::UnableToCreateDirectory { location, .. }
            | Self::UnableToList { location, .. }
            | Self::UnableToRetrieveMetadata { location, .. }
            | Self::UnableToProvideChecksum { location, .. }
            | Self::UnableToSetVisibility { location, .. }
            | Self::UnableToGenerateUrl { location, .. } => location,
            Self::UnableToCopy { from, .. } | Self::UnableToMove { from, .. } => from,
        }
    }
}
