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

//! # Ember I/O
//!
//! Resolves logical resource paths to bytes. A path is served either by a loose
//! file on disk or by an entry of a packed archive, and every result is cached by
//! path so that handles sharing a file share its bytes.

pub mod archive;
pub mod error;
pub mod file;
pub mod provider;

pub use archive::{Archive, ARCHIVE_MAGIC, ARCHIVE_VERSION};
pub use error::{ArchiveError, FileError};
pub use file::{FileOrigin, ResourceFile, ScopedData};
pub use provider::FileProvider;
