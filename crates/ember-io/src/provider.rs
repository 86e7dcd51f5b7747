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

//! Path resolution and caching for loose files and archives.

use crate::{archive::Archive, file::ResourceFile};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Resolves logical paths to [`ResourceFile`]s and caches the results.
///
/// Lookups never fail: a path that exists neither on disk nor in an opened archive
/// yields an empty file and a warning. A loose file always shadows an archive entry
/// with the same logical path.
///
/// The provider is not synchronized itself. The resource manager keeps it behind its
/// file-cache lock.
pub struct FileProvider {
    root: PathBuf,
    archives: Vec<Arc<Archive>>,
    archive_index: HashMap<String, usize>,
    direct: HashMap<String, Arc<ResourceFile>>,
}

impl FileProvider {
    /// Creates a provider resolving loose files against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archives: Vec::new(),
            archive_index: HashMap::new(),
            direct: HashMap::new(),
        }
    }

    /// The directory loose files are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens (or returns the cached) archive at `path`, relative to the root.
    ///
    /// An archive that cannot be read, or that holds no files, is logged and cached
    /// as an empty archive so the failure is reported once.
    pub fn retrieve_archive(&mut self, path: &str) -> Arc<Archive> {
        if let Some(&i) = self.archive_index.get(path) {
            return Arc::clone(&self.archives[i]);
        }

        let disk_path = self.root.join(path);
        let archive = match Archive::open(&disk_path) {
            Ok(archive) => archive,
            Err(e) => {
                log::error!("Failed to open archive '{}': {}", path, e);
                Archive::new(disk_path)
            }
        };
        if archive.is_empty() {
            log::warn!("Archive '{}' contains no files", path);
        }

        self.insert_archive(path, archive)
    }

    /// Registers an archive assembled in memory under `path`.
    pub fn mount_archive(&mut self, path: &str, archive: Archive) -> Arc<Archive> {
        self.insert_archive(path, archive)
    }

    /// Resolves a logical path to a file.
    ///
    /// Order: cached or existing loose file under the root, then each opened archive in
    /// the order it was opened, then an empty placeholder.
    pub fn retrieve_file(&mut self, path: &str) -> Arc<ResourceFile> {
        if let Some(file) = self.direct.get(path) {
            return Arc::clone(file);
        }

        let disk_path = self.root.join(path);
        if disk_path.is_file() {
            match ResourceFile::open(path, &disk_path) {
                Ok(file) => {
                    let file = Arc::new(file);
                    self.direct.insert(path.to_string(), Arc::clone(&file));
                    return file;
                }
                Err(e) => log::warn!("Failed to open loose file '{}': {}", path, e),
            }
        }

        if let Some(file) = self.archives.iter().find_map(|a| a.file(path)) {
            return file;
        }

        log::warn!("Resource file '{}' not found", path);
        Arc::new(ResourceFile::missing(path))
    }

    /// Registers a memory-only file under `path`, shadowing disk and archives.
    pub fn insert_memory_file(&mut self, path: &str, bytes: Vec<u8>) -> Arc<ResourceFile> {
        let file = Arc::new(ResourceFile::from_memory(path, bytes));
        self.direct.insert(path.to_string(), Arc::clone(&file));
        file
    }

    /// Releases the cached bytes of every file. They reload on next access.
    ///
    /// Returns the number of files that were released.
    pub fn release_data(&self) -> usize {
        let direct = self.direct.values();
        let packed = self.archives.iter().flat_map(|a| {
            a.paths()
                .filter_map(|p| a.file(p))
                .collect::<Vec<_>>()
        });
        direct
            .cloned()
            .chain(packed)
            .filter(|f| f.is_loaded() && f.unload_data().is_ok())
            .count()
    }

    /// Number of opened archives.
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    /// Number of cached loose and memory files.
    pub fn direct_count(&self) -> usize {
        self.direct.len()
    }

    fn insert_archive(&mut self, path: &str, archive: Archive) -> Arc<Archive> {
        let archive = Arc::new(archive);
        match self.archive_index.get(path) {
            Some(&i) => self.archives[i] = Arc::clone(&archive),
            None => {
                self.archive_index.insert(path.to_string(), self.archives.len());
                self.archives.push(Arc::clone(&archive));
            }
        }
        archive
    }
}
