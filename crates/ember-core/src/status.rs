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

//! Lifecycle status codes shared by handles, fences and deferred functions.

use std::fmt;

/// The lifecycle status of a resource handle, fence or deferred function.
///
/// `Ok` and `Busy` are the two non-error states. Every other variant is an error
/// and carries a negative code, so `code() < 0` is a quick error test that
/// survives a round trip through an atomic integer.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Terminal success. The resource is usable.
    Ok = 0,
    /// Work is in progress. Retry later, this is not an error.
    Busy = 1,
    /// An I/O failure while reading the backing file.
    ErrorFile = -1,
    /// An optional feature is absent. Callers should degrade, not fail.
    ErrorSupport = -2,
    /// The graphics backend or driver failed.
    ErrorSystem = -3,
    /// Programmer misuse, such as a double load or a lookup of an unknown name.
    InvalidCall = -11,
    /// Bad arguments, such as a required file that is missing.
    InvalidInput = -12,
    /// A malformed or unrecognized payload.
    ErrorData = -13,
}

impl Status {
    /// Returns the raw integer code of this status.
    pub const fn code(self) -> i8 {
        self as i8
    }

    /// Converts a raw code back into a status.
    ///
    /// Returns `None` for codes that do not name a status.
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Busy),
            -1 => Some(Status::ErrorFile),
            -2 => Some(Status::ErrorSupport),
            -3 => Some(Status::ErrorSystem),
            -11 => Some(Status::InvalidCall),
            -12 => Some(Status::InvalidInput),
            -13 => Some(Status::ErrorData),
            _ => None,
        }
    }

    /// Returns `true` for [`Status::Ok`].
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Returns `true` for [`Status::Busy`].
    pub const fn is_busy(self) -> bool {
        matches!(self, Status::Busy)
    }

    /// Returns `true` for every error status.
    pub const fn is_error(self) -> bool {
        self.code() < 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Ok => "ok",
            Status::Busy => "busy",
            Status::ErrorFile => "file error",
            Status::ErrorSupport => "unsupported",
            Status::ErrorSystem => "system error",
            Status::InvalidCall => "invalid call",
            Status::InvalidInput => "invalid input",
            Status::ErrorData => "invalid data",
        };
        write!(f, "{label} ({})", self.code())
    }
}
