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

//! Defines the error type returned by resource loads and manager lookups.

use crate::status::Status;
use std::fmt;

/// An error raised while loading, unloading or looking up a resource.
///
/// Each variant corresponds to one of the error kinds of [`Status`]. A handle that
/// receives one of these from its resource records [`ResourceError::status`] and stops
/// updating. The manager itself never aborts on these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The backing file could not be read.
    File(String),
    /// An optional backend feature is missing.
    Support(String),
    /// The graphics backend or driver reported a failure.
    System(String),
    /// The API was used incorrectly, e.g. `get` on a name with no live handle.
    InvalidCall(String),
    /// An argument was rejected, e.g. a load that needs a file but has none.
    InvalidInput(String),
    /// The payload was malformed or in an unrecognized format.
    Data(String),
}

impl ResourceError {
    /// Returns the status a handle records when its resource fails with this error.
    pub fn status(&self) -> Status {
        match self {
            ResourceError::File(_) => Status::ErrorFile,
            ResourceError::Support(_) => Status::ErrorSupport,
            ResourceError::System(_) => Status::ErrorSystem,
            ResourceError::InvalidCall(_) => Status::InvalidCall,
            ResourceError::InvalidInput(_) => Status::InvalidInput,
            ResourceError::Data(_) => Status::ErrorData,
        }
    }

    /// Returns the human-readable message carried by the error.
    pub fn message(&self) -> &str {
        match self {
            ResourceError::File(msg)
            | ResourceError::Support(msg)
            | ResourceError::System(msg)
            | ResourceError::InvalidCall(msg)
            | ResourceError::InvalidInput(msg)
            | ResourceError::Data(msg) => msg,
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::File(msg) => write!(f, "File error: {msg}"),
            ResourceError::Support(msg) => write!(f, "Feature not supported: {msg}"),
            ResourceError::System(msg) => write!(f, "Graphics system error: {msg}"),
            ResourceError::InvalidCall(msg) => write!(f, "Invalid call: {msg}"),
            ResourceError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            ResourceError::Data(msg) => write!(f, "Invalid data: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::File(err.to_string())
    }
}
