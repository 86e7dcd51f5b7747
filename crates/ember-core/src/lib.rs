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

//! # Ember Core
//!
//! Foundational crate containing the status codes, traits, and interface contracts
//! shared by every layer of the resource system.
//!
//! Nothing in here performs I/O or owns a thread. Concrete file access lives in
//! `ember-io`, handle storage in `ember-data`, the update loop in `ember-lanes`
//! and the manager itself in `ember-agents`.

#![warn(missing_docs)]

pub mod config;
pub mod graphics;
pub mod reset;
pub mod resource;
pub mod status;
pub mod sync;

pub use config::ManagerConfig;
pub use graphics::{FenceId, FenceStatus, GraphicsDevice};
pub use reset::{Reset, ResetMode};
pub use resource::{
    AnyResource, LoadContext, LoadState, Resource, ResourceError, ResourceSource, UpdateMode,
};
pub use status::Status;
