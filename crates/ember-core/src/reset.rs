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

//! The reset protocol for GPU-dependent objects living outside the handle table.

/// The direction of a manager-wide reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetMode {
    /// Rebuild GPU state (after startup or a context restore).
    Init,
    /// Tear GPU state down (before a context loss or shutdown).
    Exit,
}

/// An object that owns GPU state and must follow manager-wide resets.
///
/// Typical implementors are instanced batches or text renderers holding buffers that
/// are not resources themselves. Registration is done through the manager and undone
/// automatically when the returned binding is dropped.
///
/// Hooks take `&self` because the manager only holds a weak reference to the object.
/// Implementors keep their GPU state behind interior mutability.
pub trait Reset: Send + Sync {
    /// Releases (on [`ResetMode::Exit`]) or recreates (on [`ResetMode::Init`]) GPU state.
    ///
    /// The init hook may run while the resources it depends on are still loading.
    fn reset(&self, mode: ResetMode);

    /// Regenerates resolution-dependent state.
    fn reshape(&self) {}
}
