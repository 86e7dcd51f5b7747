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

//! A single resource file whose bytes are loaded on demand.

use crate::error::FileError;
use ember_core::{ResourceError, ResourceSource};
use parking_lot::Mutex;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Where the bytes of a [`ResourceFile`] come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOrigin {
    /// A loose file on disk.
    Loose(PathBuf),
    /// An entry inside a packed archive, at an absolute byte offset.
    Archive {
        /// Path of the archive on disk.
        archive: PathBuf,
        /// Absolute offset of the entry's payload.
        offset: u64,
    },
    /// Bytes that only exist in memory.
    Memory,
    /// A path that could not be resolved. Always empty.
    Missing,
}

struct FileState {
    origin: FileOrigin,
    data: Option<Arc<[u8]>>,
}

/// A resource file with lazily loaded, releasable contents.
///
/// The byte buffer is shared as an `Arc<[u8]>`: releasing it with
/// [`ResourceFile::unload_data`] only drops the file's own reference, readers that
/// already hold the buffer keep it alive. The next [`ResourceFile::data`] call
/// transparently reads it again.
pub struct ResourceFile {
    path: String,
    size: u64,
    state: Mutex<FileState>,
}

impl ResourceFile {
    /// Describes a loose file on disk without reading it.
    pub fn open(path: impl Into<String>, disk_path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let path = path.into();
        let disk_path = disk_path.into();
        let size = std::fs::metadata(&disk_path)
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        Ok(Self::with_origin(path, size, FileOrigin::Loose(disk_path), None))
    }

    /// Describes an entry of an archive.
    pub fn from_archive(
        path: impl Into<String>,
        archive: impl Into<PathBuf>,
        offset: u64,
        size: u64,
    ) -> Self {
        let origin = FileOrigin::Archive {
            archive: archive.into(),
            offset,
        };
        Self::with_origin(path.into(), size, origin, None)
    }

    /// Wraps bytes that only exist in memory.
    pub fn from_memory(path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self::with_origin(path.into(), bytes.len() as u64, FileOrigin::Memory, Some(bytes))
    }

    /// An empty placeholder for a path that could not be found.
    pub fn missing(path: impl Into<String>) -> Self {
        Self::with_origin(path.into(), 0, FileOrigin::Missing, None)
    }

    fn with_origin(path: String, size: u64, origin: FileOrigin, data: Option<Arc<[u8]>>) -> Self {
        Self {
            path,
            size,
            state: Mutex::new(FileState { origin, data }),
        }
    }

    /// The logical path of the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The size of the payload in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Where the payload is read from.
    pub fn origin(&self) -> FileOrigin {
        self.state.lock().origin.clone()
    }

    /// Returns `true` while the payload is held in memory.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Returns the payload, reading it from its origin if it is not in memory.
    pub fn data(&self) -> Result<Arc<[u8]>, FileError> {
        let mut state = self.state.lock();
        if let Some(data) = &state.data {
            return Ok(Arc::clone(data));
        }

        let bytes = match &state.origin {
            FileOrigin::Loose(disk_path) => {
                std::fs::read(disk_path).map_err(|source| self.io_error(source))?
            }
            FileOrigin::Archive { archive, offset } => self.read_entry(archive, *offset)?,
            FileOrigin::Memory => Vec::new(),
            FileOrigin::Missing => return Err(FileError::Missing(self.path.clone())),
        };

        let data: Arc<[u8]> = bytes.into();
        state.data = Some(Arc::clone(&data));
        Ok(data)
    }

    /// Releases the in-memory payload.
    ///
    /// Fails for memory-only files, which have nothing to reload from.
    pub fn unload_data(&self) -> Result<(), FileError> {
        let mut state = self.state.lock();
        if state.origin == FileOrigin::Memory {
            return Err(FileError::MemoryOnly(self.path.clone()));
        }
        state.data = None;
        Ok(())
    }

    /// Loads the payload and keeps it resident until the returned guard is dropped.
    ///
    /// Useful for resources that only need the bytes during an upload.
    pub fn scoped(&self) -> Result<ScopedData<'_>, FileError> {
        let data = self.data()?;
        Ok(ScopedData { file: self, data })
    }

    /// Points an archive entry at a new location after its archive was rewritten.
    pub(crate) fn relocate(&self, archive: PathBuf, offset: u64) {
        let mut state = self.state.lock();
        state.origin = FileOrigin::Archive { archive, offset };
    }

    fn read_entry(&self, archive: &Path, offset: u64) -> Result<Vec<u8>, FileError> {
        let mut buffer = vec![0; self.size as usize];
        let mut file = File::open(archive).map_err(|source| self.io_error(source))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| self.io_error(source))?;
        file.read_exact(&mut buffer)
            .map_err(|source| self.io_error(source))?;
        Ok(buffer)
    }

    fn io_error(&self, source: std::io::Error) -> FileError {
        FileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for ResourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("origin", &self.origin())
            .finish()
    }
}

impl ResourceSource for ResourceFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&self) -> Result<Arc<[u8]>, ResourceError> {
        Ok(self.data()?)
    }
}

/// Keeps a file's payload resident. Dropping it releases the payload again.
pub struct ScopedData<'a> {
    file: &'a ResourceFile,
    data: Arc<[u8]>,
}

impl Deref for ScopedData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for ScopedData<'_> {
    fn drop(&mut self) {
        // Memory-only files refuse to unload, which is fine here.
        let _ = self.file.unload_data();
    }
}
