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

#![allow(dead_code)]

use ember_core::{LoadContext, LoadState, Resource, ResourceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A texture that reads its file, allocates a GPU name and submits an upload.
#[derive(Default)]
pub struct Texture {
    pub gpu_id: u32,
    pub bytes: usize,
    pub unloads: Option<Arc<AtomicUsize>>,
}

impl Texture {
    pub fn counting(unloads: &Arc<AtomicUsize>) -> Self {
        Self {
            unloads: Some(Arc::clone(unloads)),
            ..Default::default()
        }
    }
}

impl Resource for Texture {
    fn load(&mut self, ctx: &LoadContext<'_>) -> Result<LoadState, ResourceError> {
        let data = ctx.read_file()?;
        self.bytes = data.len();
        self.gpu_id = ctx.device().generate_names(1).first().copied().unwrap_or(0);
        Ok(LoadState::Submitted)
    }

    fn unload(&mut self) -> Result<(), ResourceError> {
        self.gpu_id = 0;
        if let Some(unloads) = &self.unloads {
            unloads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A resource without a file that is ready on its first load step.
#[derive(Default)]
pub struct Flag {
    pub loads: usize,
}

impl Resource for Flag {
    fn load(&mut self, _ctx: &LoadContext<'_>) -> Result<LoadState, ResourceError> {
        self.loads += 1;
        Ok(LoadState::Ready)
    }

    fn unload(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}
