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

use super::ResourceError;
use crate::graphics::GraphicsDevice;
use std::sync::Arc;

/// Read access to the bytes backing a resource.
///
/// Implemented by the file layer for loose files, archive entries and in-memory blobs.
pub trait ResourceSource: Send + Sync {
    /// The logical path the source was retrieved under.
    fn path(&self) -> &str;

    /// The size of the payload in bytes. Zero for a file that could not be found.
    fn size(&self) -> u64;

    /// Returns the payload, reading it from storage on first access.
    fn read(&self) -> Result<Arc<[u8]>, ResourceError>;
}

/// Everything a [`Resource`](super::Resource) may use while loading.
pub struct LoadContext<'a> {
    file: Option<&'a dyn ResourceSource>,
    device: &'a dyn GraphicsDevice,
    on_worker: bool,
}

impl<'a> LoadContext<'a> {
    /// Creates a context for one load call.
    pub fn new(
        file: Option<&'a dyn ResourceSource>,
        device: &'a dyn GraphicsDevice,
        on_worker: bool,
    ) -> Self {
        Self {
            file,
            device,
            on_worker,
        }
    }

    /// The file attached to the handle, if any.
    pub fn file(&self) -> Option<&'a dyn ResourceSource> {
        self.file
    }

    /// The graphics device to create GPU objects on.
    pub fn device(&self) -> &'a dyn GraphicsDevice {
        self.device
    }

    /// `true` when the call happens on the background worker's context.
    pub fn on_worker(&self) -> bool {
        self.on_worker
    }

    /// Reads the attached file.
    ///
    /// Fails with [`ResourceError::InvalidInput`] when no file is attached and with
    /// [`ResourceError::File`] when the file is empty (not found at retrieval time).
    pub fn read_file(&self) -> Result<Arc<[u8]>, ResourceError> {
        let file = self
            .file
            .ok_or_else(|| ResourceError::InvalidInput("no file attached".to_string()))?;
        if file.size() == 0 {
            return Err(ResourceError::File(format!(
                "'{}' is empty or missing",
                file.path()
            )));
        }
        file.read()
    }
}
