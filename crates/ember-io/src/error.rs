// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for file and archive access.

use ember_core::ResourceError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or releasing a single file's bytes.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{0}' only exists in memory and cannot be released")]
    MemoryOnly(String),
    #[error("'{0}' was not found")]
    Missing(String),
}

impl From<FileError> for ResourceError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::MemoryOnly(_) => ResourceError::InvalidCall(err.to_string()),
            FileError::Io { .. } | FileError::Missing(_) => ResourceError::File(err.to_string()),
        }
    }
}

/// Errors raised while parsing, editing or writing a packed archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{path}' is not an archive (magic {found:#010x})")]
    BadMagic { path: PathBuf, found: u32 },
    #[error("'{path}' has unsupported archive version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
    #[error("'{path}' is truncated: {detail}")]
    Truncated { path: PathBuf, detail: String },
    #[error("{what} ({value}) does not fit the 32-bit archive format")]
    TooLarge { what: String, value: u64 },
    #[error("entry path is not valid UTF-8")]
    InvalidPath,
    #[error("archive already contains '{0}'")]
    Duplicate(String),
    #[error("archive does not contain '{0}'")]
    NotFound(String),
    #[error("failed to read entry data: {0}")]
    File(#[from] FileError),
}
