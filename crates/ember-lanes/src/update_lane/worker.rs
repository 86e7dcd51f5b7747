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

//! Background thread running the resource update loop at a fixed rate.

use ember_core::{GraphicsDevice, ManagerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for the update worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name of the spawned thread.
    pub thread_name: String,
    /// Minimum time between two ticks.
    pub tick: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ManagerConfig::default())
    }
}

impl From<&ManagerConfig> for WorkerConfig {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            thread_name: config.worker_thread_name.clone(),
            tick: config.tick_duration(),
        }
    }
}

/// The background resource thread.
///
/// On start it binds the device's secondary context, then calls its tick function
/// once per `tick` until stopped. If the context cannot be bound the thread logs
/// the failure and exits, and [`UpdateWorker::is_running`] turns false so the owner
/// can fall back to main-thread updates.
pub struct UpdateWorker {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl UpdateWorker {
    /// Spawns the worker thread.
    pub fn start(
        config: WorkerConfig,
        device: Arc<dyn GraphicsDevice>,
        mut tick: impl FnMut() + Send + 'static,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let tick_duration = config.tick;

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                if let Err(e) = device.bind_worker_context() {
                    log::error!("Secondary context could not be assigned to resource thread: {}", e);
                    thread_running.store(false, Ordering::SeqCst);
                    return;
                }
                log::info!("Resource thread '{}' started.", config.thread_name);

                while thread_running.load(Ordering::Relaxed) {
                    let start_time = Instant::now();

                    tick();

                    let elapsed = start_time.elapsed();
                    if elapsed < tick_duration {
                        thread::sleep(tick_duration - elapsed);
                    }
                }

                device.release_worker_context();
                log::info!("Resource thread '{}' finished.", config.thread_name);
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Returns `true` while the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals the thread to stop and waits for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Resource thread panicked.");
            }
        }
    }
}

impl Drop for UpdateWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
