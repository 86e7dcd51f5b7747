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

// Drives the resource manager over a headless device.
// Run with: cargo run -p sandbox -- --worker

use anyhow::{Context, Result};
use clap::Parser;
use ember_agents::{ResetBinding, ResourceManager};
use ember_core::sync::NamePool;
use ember_core::{
    GraphicsDevice, LoadContext, LoadState, ManagerConfig, Reset, ResetMode, Resource,
    ResourceError, UpdateMode,
};
use ember_infra::headless::HeadlessDevice;
use ember_io::{Archive, ResourceFile};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Loads a few resources through the Ember resource manager")]
struct Args {
    /// JSON manager configuration. Its `root` and `archives` are replaced by the demo
    /// data directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give the headless device a secondary context so a worker thread drives loading.
    #[arg(long)]
    worker: bool,

    /// Polls a fence needs before it retires.
    #[arg(long, default_value_t = 3)]
    fence_latency: u32,

    /// Frames to simulate after startup.
    #[arg(long, default_value_t = 5)]
    frames: u32,
}

/// A decoded image. The payload is only measured, the GPU side is a name.
#[derive(Default)]
struct Image {
    name: u32,
    size: usize,
}

impl Resource for Image {
    fn load(&mut self, ctx: &LoadContext<'_>) -> Result<LoadState, ResourceError> {
        let data = ctx.read_file()?;
        self.size = data.len();
        self.name = ctx
            .device()
            .generate_names(1)
            .first()
            .copied()
            .ok_or_else(|| ResourceError::System("device returned no name".to_string()))?;
        Ok(LoadState::Submitted)
    }

    fn unload(&mut self) -> Result<(), ResourceError> {
        self.name = 0;
        Ok(())
    }
}

/// Sampler objects shared by every image. Rebuilt on each reset.
struct SamplerCache {
    device: Arc<dyn GraphicsDevice>,
    capacity: usize,
    pool: Mutex<Option<NamePool>>,
    _binding: ResetBinding,
}

impl SamplerCache {
    fn new(manager: &ResourceManager) -> Arc<Self> {
        let device = Arc::clone(manager.device());
        let capacity = manager.config().name_pool_size;
        let pool = NamePool::from_device("samplers", &*device, capacity);
        Arc::new_cyclic(|weak: &Weak<SamplerCache>| SamplerCache {
            device,
            capacity,
            pool: Mutex::new(Some(pool)),
            _binding: manager.register_reset(weak.clone() as Weak<dyn Reset>),
        })
    }

    fn acquire(&self) -> u32 {
        self.pool.lock().as_ref().map_or(0, |pool| pool.acquire())
    }
}

impl Reset for SamplerCache {
    fn reset(&self, mode: ResetMode) {
        let mut pool = self.pool.lock();
        match mode {
            ResetMode::Exit => {
                if let Some(pool) = pool.take() {
                    self.device.delete_names(&pool.drain());
                }
            }
            ResetMode::Init => {
                *pool = Some(NamePool::from_device("samplers", &*self.device, self.capacity));
            }
        }
    }
}

fn write_demo_data(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root.join("textures")).context("creating the texture directory")?;
    std::fs::write(root.join("textures/loose.img"), vec![0xAB; 4096])
        .context("writing the loose texture")?;
    std::fs::write(root.join("textures/fallback.img"), vec![0x00; 16])
        .context("writing the fallback texture")?;

    let mut archive = Archive::new(root.join("demo.pack"));
    archive
        .add_file(ResourceFile::from_memory("textures/packed.img", vec![0xCD; 2048]))
        .context("adding the packed texture")?;
    archive.save().context("saving demo.pack")?;
    Ok(())
}

fn load_config(args: &Args, root: &Path) -> Result<ManagerConfig> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("reading {}", path.display()))?,
        None => ManagerConfig::default(),
    };
    config.root = root.to_path_buf();
    config.archives = vec!["demo.pack".to_string()];
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let data = tempfile::tempdir().context("creating the demo data directory")?;
    write_demo_data(data.path())?;
    let config = load_config(&args, data.path())?;

    let device = Arc::new(
        HeadlessDevice::new()
            .with_fence_latency(args.fence_latency)
            .with_worker_context(args.worker),
    );
    let manager = Arc::new(ResourceManager::new(device.clone(), config));
    let samplers = SamplerCache::new(&manager);

    let fallback = manager.set_default::<Image>(Some("textures/fallback.img"));
    log::info!("Fallback image: {}", fallback);

    let loose = manager
        .load::<Image>("loose", UpdateMode::Auto, Some("textures/loose.img"))
        .context("loading the loose image")?;
    let packed = manager
        .load::<Image>("packed", UpdateMode::Auto, Some("textures/packed.img"))
        .context("loading the packed image")?;
    let current = manager.load_proxy_new::<Image>();
    manager
        .assign_proxy(&current, Some(&loose))
        .context("pointing the proxy at the loose image")?;

    log::info!(
        "Before startup, the proxy reads {:?} bytes",
        manager.read(&current, |image| image.size)
    );
    let pending = manager.wait_for_startup(None);
    log::info!("Startup finished with {} resources pending", pending);

    for frame in 0..args.frames {
        manager.update_resources();
        manager.update_functions();
        if frame == 1 {
            manager
                .assign_proxy(&current, Some(&packed))
                .context("redirecting the proxy")?;
        }
        log::info!(
            "Frame {}: proxy {} ({:?} bytes), sampler {}",
            frame,
            current.status(),
            manager.read(&current, |image| image.size),
            samplers.acquire()
        );
        std::thread::sleep(Duration::from_millis(10));
    }

    manager.reset(ResetMode::Exit);
    log::info!(
        "After exit: {} live fences, loose image {}",
        device.live_fences(),
        loose.status()
    );
    manager.reset(ResetMode::Init);
    manager.wait_for_startup(None);
    log::info!(
        "After init: loose image name {:?}, packed image name {:?}",
        manager.read(&loose, |image| image.name),
        manager.read(&packed, |image| image.name)
    );

    let mut packed = Some(packed);
    manager.free(&mut packed);
    manager.assign_proxy(&current, None).context("detaching the proxy")?;
    log::info!("Reclaimed {} resources", manager.apply_nullify());

    drop(samplers);
    Ok(())
}
