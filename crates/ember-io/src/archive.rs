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

//! Reader and writer for packed resource archives.
//!
//! Layout, every integer a little-endian `u32`:
//!
//! ```text
//! magic | version | count
//! count x (path_len | path bytes | size | absolute offset)
//! payloads, in header order
//! ```

use crate::{error::ArchiveError, file::ResourceFile};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

/// Identifies a packed archive.
pub const ARCHIVE_MAGIC: u32 = 0x012F_5B66;
/// The only archive version this reader understands.
pub const ARCHIVE_VERSION: u32 = 1;

const FIXED_HEADER: u64 = 12;
const ENTRY_HEADER: u64 = 12;

/// A set of resource files stored back to back in one file on disk.
///
/// Entries are [`ResourceFile`]s reading from the archive lazily. Archives can also be
/// assembled in memory and written out with [`Archive::save`].
pub struct Archive {
    path: PathBuf,
    files: Vec<Arc<ResourceFile>>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Creates an empty archive that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Reads the header of the archive at `path`. Payloads are not loaded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::open(&path)?;
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let magic = read_u32(&mut reader, &path, "magic")?;
        if magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic { path, found: magic });
        }
        let version = read_u32(&mut reader, &path, "version")?;
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion { path, version });
        }
        let count = read_u32(&mut reader, &path, "file count")?;

        let mut archive = Archive::new(path.clone());
        let mut position = FIXED_HEADER;
        for _ in 0..count {
            let name_len = read_u32(&mut reader, &path, "path length")?;
            position += 4;
            if u64::from(name_len) > total.saturating_sub(position) {
                return Err(ArchiveError::Truncated {
                    path,
                    detail: format!("entry path of {name_len} bytes runs past the end of the file"),
                });
            }
            position += u64::from(name_len) + 8;
            let mut name = vec![0u8; name_len as usize];
            reader
                .read_exact(&mut name)
                .map_err(|e| truncated(e, &path, "entry path"))?;
            let name = String::from_utf8(name).map_err(|_| ArchiveError::InvalidPath)?;
            let size = read_u32(&mut reader, &path, "entry size")? as u64;
            let offset = read_u32(&mut reader, &path, "entry offset")? as u64;

            if offset + size > total {
                return Err(ArchiveError::Truncated {
                    path,
                    detail: format!("entry '{name}' ends past the end of the file"),
                });
            }
            if archive.index.contains_key(&name) {
                log::warn!("Archive '{}' lists '{}' twice, keeping the first", path.display(), name);
                continue;
            }
            archive.push(ResourceFile::from_archive(name, path.clone(), offset, size));
        }

        log::debug!("Opened archive '{}' with {} files", path.display(), archive.len());
        Ok(archive)
    }

    /// Path of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks up an entry by its logical path.
    pub fn file(&self, name: &str) -> Option<Arc<ResourceFile>> {
        self.index.get(name).map(|&i| Arc::clone(&self.files[i]))
    }

    /// Logical paths of all entries, in storage order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path())
    }

    /// Adds an entry. The entry is written on the next [`Archive::save`].
    pub fn add_file(&mut self, file: ResourceFile) -> Result<Arc<ResourceFile>, ArchiveError> {
        if self.index.contains_key(file.path()) {
            return Err(ArchiveError::Duplicate(file.path().to_string()));
        }
        Ok(self.push(file))
    }

    /// Adds a loose file from disk under the logical path `name`.
    pub fn add_loose(
        &mut self,
        name: &str,
        disk_path: impl Into<PathBuf>,
    ) -> Result<Arc<ResourceFile>, ArchiveError> {
        let file = ResourceFile::open(name, disk_path)?;
        self.add_file(file)
    }

    /// Removes an entry. The change is written on the next [`Archive::save`].
    pub fn remove_file(&mut self, name: &str) -> Result<Arc<ResourceFile>, ArchiveError> {
        let position = self
            .index
            .remove(name)
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))?;
        let removed = self.files.remove(position);
        // Payloads read lazily from the old location, so keep the bytes around.
        if let Err(e) = removed.data() {
            log::warn!("Removed entry '{}' could not be read: {}", name, e);
        }
        self.rebuild_index();
        Ok(removed)
    }

    /// Writes the archive to its own path.
    pub fn save(&mut self) -> Result<(), ArchiveError> {
        let path = self.path.clone();
        self.save_as(path)
    }

    /// Writes the archive to `path` and makes it the archive's new location.
    ///
    /// Every payload is read into memory first, so saving over the file the entries
    /// were read from is safe. Entries keep their identity and are re-pointed at
    /// their new offsets.
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<(), ArchiveError> {
        let path = path.into();

        let payloads = self
            .files
            .iter()
            .map(|file| file.data())
            .collect::<Result<Vec<_>, _>>()?;

        let header: u64 = FIXED_HEADER
            + self
                .files
                .iter()
                .map(|f| ENTRY_HEADER + f.path().len() as u64)
                .sum::<u64>();

        // Every header field is range checked before the file is touched.
        let count = fit_u32(self.files.len() as u64, "file count")?;
        let mut entries = Vec::with_capacity(self.files.len());
        let mut offsets = Vec::with_capacity(self.files.len());
        let mut cursor = header;
        for (file, payload) in self.files.iter().zip(&payloads) {
            entries.push((
                fit_u32(file.path().len() as u64, "entry path length")?,
                fit_u32(payload.len() as u64, "entry size")?,
                fit_u32(cursor, "entry offset")?,
            ));
            offsets.push(cursor);
            cursor += payload.len() as u64;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_u32::<LittleEndian>(ARCHIVE_MAGIC)?;
        writer.write_u32::<LittleEndian>(ARCHIVE_VERSION)?;
        writer.write_u32::<LittleEndian>(count)?;
        for (file, (path_len, size, offset)) in self.files.iter().zip(&entries) {
            writer.write_u32::<LittleEndian>(*path_len)?;
            writer.write_all(file.path().as_bytes())?;
            writer.write_u32::<LittleEndian>(*size)?;
            writer.write_u32::<LittleEndian>(*offset)?;
        }
        for payload in &payloads {
            writer.write_all(payload)?;
        }
        writer.flush()?;

        for (file, offset) in self.files.iter().zip(offsets) {
            file.relocate(path.clone(), offset);
        }
        log::info!("Saved archive '{}' ({} files, {} bytes)", path.display(), self.files.len(), cursor);
        self.path = path;
        Ok(())
    }

    fn push(&mut self, file: ResourceFile) -> Arc<ResourceFile> {
        let file = Arc::new(file);
        self.index.insert(file.path().to_string(), self.files.len());
        self.files.push(Arc::clone(&file));
        file
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path().to_string(), i))
            .collect();
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("files", &self.files.len())
            .finish()
    }
}

fn fit_u32(value: u64, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::TooLarge {
        what: what.to_string(),
        value,
    })
}

fn read_u32(reader: &mut impl Read, path: &Path, what: &str) -> Result<u32, ArchiveError> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(e, path, what))
}

fn truncated(err: std::io::Error, path: &Path, what: &str) -> ArchiveError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ArchiveError::Truncated {
            path: path.to_path_buf(),
            detail: format!("missing {what}"),
        }
    } else {
        ArchiveError::Io(err)
    }
}
