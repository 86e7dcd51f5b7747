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

//! Acts as the **[A]gent** for the resource subsystem.
//!
//! This module provides the public-facing API for requesting resources and querying
//! their state. The heavy lifting is delegated: loading steps to the handles in
//! `ember-data`, the table walk and the worker thread to the `update_lane`, and byte
//! access to `ember-io`.
//!
//! The entry point is [`ResourceManager`]. It is an explicit service, constructed
//! once at startup and shared by `Arc` with every component that loads resources.

mod manager;
mod proxy;
mod ptr;
mod reset;

pub use self::manager::ResourceManager;
pub use self::ptr::ResourcePtr;
pub use self::reset::{ResetBinding, ResetRegistry};
