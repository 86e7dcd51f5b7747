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

//! The capability contract every resource kind implements.
//!
//! A resource (texture, shader program, mesh, font, ...) is a plain Rust value that
//! knows how to turn the bytes of a [`ResourceSource`] into GPU state and how to release
//! that state again. Everything else (deduplication, reference counting, threading,
//! fences) is handled by the layers above.

mod context;
mod error;

pub use self::context::{LoadContext, ResourceSource};
pub use self::error::ResourceError;

use std::any::Any;

/// The outcome of one successful call to [`Resource::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Loading finished and no GPU work is outstanding.
    Ready,
    /// More work remains. `load` will be called again on a later update.
    Pending,
    /// CPU-side work finished and GPU commands were issued.
    ///
    /// The owning handle inserts a fence and only reports the resource as usable
    /// once that fence has retired. `load` is not called again.
    Submitted,
}

/// Whether a handle is driven by the update loop or by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// The worker (or the main-thread pump) loads the resource.
    #[default]
    Auto,
    /// The caller populates the resource itself.
    Manual,
}

/// A loadable, GPU-backed resource.
///
/// Implementations must stay safe to query while loading is incomplete (a size of
/// zero or a null GPU identifier), because dependents may hold them in that state.
pub trait Resource: Send + 'static {
    /// Loads (or continues loading) the resource.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The backing file, the graphics device and the calling thread's role.
    ///
    /// # Returns
    ///
    /// A [`LoadState`] describing how far loading progressed, or a [`ResourceError`]
    /// that permanently fails the owning handle.
    fn load(&mut self, ctx: &LoadContext<'_>) -> Result<LoadState, ResourceError>;

    /// Releases every GPU object owned by the resource.
    ///
    /// Must be a no-op when nothing was ever allocated, since it runs on partially
    /// loaded resources during a reset.
    fn unload(&mut self) -> Result<(), ResourceError>;

    /// Re-derives resolution-dependent state after the output surface changed size.
    fn reshape(&mut self) {}
}

/// Object-safe view of a [`Resource`] that can be downcast to its concrete type.
///
/// Implemented for every `Resource` automatically.
pub trait AnyResource: Resource {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Returns the concrete type name, used in diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Resource> AnyResource for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}
