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

mod common;

use common::{init_logging, Flag, Texture};
use ember_agents::{ResetBinding, ResourceManager, ResourcePtr};
use ember_core::{ManagerConfig, Reset, ResetMode, Resource, ResourceError, Status, UpdateMode};
use ember_infra::headless::HeadlessDevice;
use ember_io::{Archive, ResourceFile};
use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn manager_at(device: &Arc<HeadlessDevice>, root: &Path) -> ResourceManager {
    let config = ManagerConfig {
        root: root.to_path_buf(),
        ..Default::default()
    };
    ResourceManager::new(device.clone(), config)
}

fn pump_until_usable<T: Resource>(manager: &ResourceManager, ptr: &ResourcePtr<T>) -> bool {
    for _ in 0..50 {
        if manager.is_usable(ptr) {
            return true;
        }
        manager.update_resources();
    }
    manager.is_usable(ptr)
}

struct Recorder {
    modes: Mutex<Vec<ResetMode>>,
    reshapes: AtomicUsize,
    _binding: ResetBinding,
}

impl Reset for Recorder {
    fn reset(&self, mode: ResetMode) {
        self.modes.lock().unwrap().push(mode);
    }

    fn reshape(&self) {
        self.reshapes.fetch_add(1, Ordering::SeqCst);
    }
}

fn recorder(manager: &ResourceManager) -> Arc<Recorder> {
    Arc::new_cyclic(|weak: &Weak<Recorder>| Recorder {
        modes: Mutex::new(Vec::new()),
        reshapes: AtomicUsize::new(0),
        _binding: manager.register_reset(weak.clone() as Weak<dyn Reset>),
    })
}

#[test]
fn concurrent_loads_share_one_instance() {
    init_logging();

    // --- ARRANGE ---
    let device = Arc::new(HeadlessDevice::new());
    let dir = tempdir().unwrap();
    let manager = Arc::new(manager_at(&device, dir.path()));
    let built = Arc::new(AtomicUsize::new(0));

    // --- ACT ---
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let built = Arc::clone(&built);
            thread::spawn(move || {
                manager
                    .load_with("shared.flag", UpdateMode::Auto, None, || {
                        built.fetch_add(1, Ordering::SeqCst);
                        Flag::default()
                    })
                    .unwrap()
            })
        })
        .collect();
    let ptrs: Vec<ResourcePtr<Flag>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    // --- ASSERT ---
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(manager.handle_count(), 1);
    assert!(ptrs.iter().all(|p| p.ptr_eq(&ptrs[0])));
    assert_eq!(ptrs[0].refs(), 8);
}

#[test]
fn file_backed_texture_is_busy_until_updated() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("data"))?;
    std::fs::write(dir.path().join("data/t.png"), [1u8; 64])?;
    let device = Arc::new(HeadlessDevice::new().with_fence_latency(2));
    let manager = manager_at(&device, dir.path());

    // --- ACT ---
    let loaded = manager.load::<Texture>("t.png", UpdateMode::Auto, Some("data/t.png"))?;
    let fetched = manager.get::<Texture>("t.png")?;

    // --- ASSERT ---
    assert_eq!(fetched.status(), Status::Busy);
    assert!(!manager.is_usable(&fetched));
    assert_eq!(manager.read(&fetched, |t| t.gpu_id), None);

    assert!(pump_until_usable(&manager, &fetched));
    assert_eq!(manager.status(&loaded), Status::Ok);
    assert_eq!(manager.read(&fetched, |t| t.bytes), Some(64));
    assert_ne!(manager.read(&fetched, |t| t.gpu_id), Some(0));
    assert_eq!(device.live_fences(), 0);
    Ok(())
}

#[test]
fn missing_file_is_reported_as_a_file_error() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let texture = manager.load::<Texture>("gone.png", UpdateMode::Auto, Some("data/gone.png"))?;

    // --- ACT ---
    manager.update_resources();

    // --- ASSERT ---
    assert_eq!(texture.status(), Status::ErrorFile);
    assert_eq!(manager.wait_for_startup(Some(Duration::from_millis(10))), 0);
    Ok(())
}

#[test]
fn lookups_reject_bad_names_and_kinds() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let _flag = manager.load::<Flag>("thing", UpdateMode::Manual, None)?;

    assert!(matches!(
        manager.get::<Flag>("unknown"),
        Err(ResourceError::InvalidCall(_))
    ));
    assert!(matches!(
        manager.get::<Texture>("thing"),
        Err(ResourceError::InvalidCall(_))
    ));
    assert!(matches!(
        manager.load::<Texture>("thing", UpdateMode::Auto, None),
        Err(ResourceError::InvalidCall(_))
    ));
    assert!(matches!(
        manager.load::<Flag>("", UpdateMode::Auto, None),
        Err(ResourceError::InvalidInput(_))
    ));
    Ok(())
}

#[test]
fn freed_handle_is_reclaimed_exactly_once() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let unloads = Arc::new(AtomicUsize::new(0));
    manager.insert_memory_file("mem/a.png", vec![3u8; 16]);
    let mut slot = Some(manager.load_with("a.png", UpdateMode::Auto, Some("mem/a.png"), || {
        Texture::counting(&unloads)
    })?);
    let handle = Arc::clone(slot.as_ref().map(|p| p.handle()).unwrap());

    // --- ACT ---
    manager.free(&mut slot);

    // --- ASSERT ---
    assert!(slot.is_none());
    assert_eq!(handle.refs(), 0);
    assert_eq!(manager.handle_count(), 1);
    assert_eq!(manager.apply_nullify(), 1);
    assert_eq!(manager.apply_nullify(), 0);
    assert_eq!(manager.handle_count(), 0);
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert!(manager.get::<Texture>("a.png").is_err());
    Ok(())
}

#[test]
fn handle_referenced_again_before_reclaim_survives() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let first = manager.load::<Flag>("flag", UpdateMode::Auto, None)?;
    drop(first);

    let again = manager.get::<Flag>("flag")?;

    assert_eq!(manager.apply_nullify(), 0);
    assert_eq!(again.refs(), 1);
    assert_eq!(manager.handle_count(), 1);
    Ok(())
}

#[test]
fn get_never_returns_a_reclaimed_handle() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = Arc::new(manager_at(&device, dir.path()));
    let stop = Arc::new(AtomicBool::new(false));
    let reapers: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    manager.apply_nullify();
                }
            })
        })
        .collect();

    // --- ACT ---
    let mut orphaned = 0;
    for i in 0..2000 {
        let name = format!("r{}", i);
        let mut slot = Some(manager.load::<Flag>(&name, UpdateMode::Auto, None)?);
        manager.free(&mut slot);
        // Reclaimed before the lookup: nothing to check for this name.
        let Ok(found) = manager.get::<Flag>(&name) else {
            continue;
        };
        match manager.get::<Flag>(&name) {
            Ok(again) if again.ptr_eq(&found) => {}
            _ => orphaned += 1,
        }
    }
    stop.store(true, Ordering::Release);
    for reaper in reapers {
        reaper.join().unwrap();
    }

    // --- ASSERT ---
    assert_eq!(orphaned, 0);
    Ok(())
}

#[test]
fn proxy_reads_its_target() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    manager.insert_memory_file("mem/t.png", vec![9u8; 32]);
    let target = manager.load::<Texture>("t.png", UpdateMode::Auto, Some("mem/t.png"))?;
    let proxy = manager.load_proxy_new::<Texture>();

    // --- ACT ---
    manager.assign_proxy(&proxy, Some(&target))?;

    // --- ASSERT ---
    assert_eq!(proxy.status(), Status::Busy);
    assert_eq!(target.refs(), 2);
    assert_eq!(manager.proxy_target(&proxy), Some(target.id()));

    assert!(pump_until_usable(&manager, &target));
    assert!(manager.is_usable(&proxy));
    assert_eq!(
        manager.read(&proxy, |t| t.gpu_id),
        manager.read(&target, |t| t.gpu_id)
    );

    manager.assign_proxy(&proxy, None)?;
    assert_eq!(target.refs(), 1);
    assert_eq!(proxy.status(), Status::Busy);
    assert_eq!(manager.read(&proxy, |t| t.gpu_id), None);
    Ok(())
}

#[test]
fn stale_target_does_not_publish_into_a_redirected_proxy() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let a = manager.load::<Flag>("a", UpdateMode::Auto, None)?;
    let b = manager.load::<Flag>("b", UpdateMode::Auto, None)?;
    let proxy = manager.load_proxy_new::<Flag>();

    // --- ACT ---
    manager.assign_proxy(&proxy, Some(&a))?;
    manager.assign_proxy(&proxy, Some(&b))?;
    manager.update_now(&a);

    // --- ASSERT ---
    assert_eq!(a.refs(), 1);
    assert_eq!(b.refs(), 2);
    assert_eq!(proxy.status(), Status::Busy);

    manager.update_now(&b);
    assert_eq!(proxy.status(), Status::Ok);
    assert_eq!(manager.read(&proxy, |f| f.loads), Some(1));
    Ok(())
}

#[test]
fn invalid_proxy_assignments_are_refused() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let plain = manager.load::<Flag>("plain", UpdateMode::Auto, None)?;
    let proxy = manager.load_proxy_new::<Flag>();
    let other = manager.load_proxy_new::<Flag>();

    assert!(matches!(
        manager.assign_proxy(&plain, Some(&plain)),
        Err(ResourceError::InvalidCall(_))
    ));
    assert!(matches!(
        manager.assign_proxy(&proxy, Some(&proxy)),
        Err(ResourceError::InvalidInput(_))
    ));
    assert!(matches!(
        manager.assign_proxy(&proxy, Some(&other)),
        Err(ResourceError::InvalidInput(_))
    ));
    assert_eq!(plain.refs(), 1);
    Ok(())
}

#[test]
fn freeing_a_proxy_releases_its_target() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let target = manager.load::<Flag>("target", UpdateMode::Auto, None)?;
    let mut proxy = Some(manager.load_proxy_new::<Flag>());
    manager.assign_proxy(proxy.as_ref().unwrap(), Some(&target))?;
    assert_eq!(target.refs(), 2);

    manager.free(&mut proxy);

    assert_eq!(manager.apply_nullify(), 1);
    assert_eq!(target.refs(), 1);
    assert_eq!(manager.handle_count(), 1);
    Ok(())
}

#[test]
fn relinking_to_a_failed_target_does_not_pile_up_callbacks() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let broken = manager.load::<Texture>("gone.png", UpdateMode::Auto, Some("data/gone.png"))?;
    let spare = manager.load::<Texture>("spare.png", UpdateMode::Auto, Some("data/spare.png"))?;
    manager.update_resources();
    assert_eq!(broken.status(), Status::ErrorFile);
    let proxy = manager.load_proxy_new::<Texture>();

    // --- ACT ---
    for _ in 0..10 {
        manager.assign_proxy(&proxy, Some(&broken))?;
    }
    manager.reset(ResetMode::Exit);
    manager.reset(ResetMode::Init);

    // --- ASSERT ---
    assert_eq!(broken.handle().pending_callbacks(), 1);
    assert_eq!(proxy.status(), Status::Busy);

    manager.assign_proxy(&proxy, Some(&spare))?;
    assert_eq!(broken.handle().pending_callbacks(), 0);
    assert_eq!(spare.handle().pending_callbacks(), 1);
    manager.assign_proxy(&proxy, None)?;
    assert_eq!(spare.handle().pending_callbacks(), 0);
    Ok(())
}

#[test]
fn reset_rebuilds_resources_with_fresh_gpu_names() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let observer = recorder(&manager);
    manager.insert_memory_file("mem/t.png", vec![5u8; 8]);
    let texture = manager.load::<Texture>("t.png", UpdateMode::Auto, Some("mem/t.png"))?;
    let proxy = manager.load_proxy_new::<Texture>();
    manager.assign_proxy(&proxy, Some(&texture))?;
    assert!(pump_until_usable(&manager, &texture));
    let before = manager.read(&texture, |t| t.gpu_id);

    // --- ACT ---
    manager.reset(ResetMode::Exit);
    manager.reset(ResetMode::Exit);

    // --- ASSERT ---
    assert!(!manager.is_active());
    assert_eq!(texture.status(), Status::Busy);
    assert_eq!(proxy.status(), Status::Busy);
    assert!(device.finish_count() >= 1);
    assert_eq!(*observer.modes.lock().unwrap(), vec![ResetMode::Exit]);

    // --- ACT ---
    manager.reset(ResetMode::Init);
    assert!(pump_until_usable(&manager, &texture));

    // --- ASSERT ---
    assert_eq!(
        *observer.modes.lock().unwrap(),
        vec![ResetMode::Exit, ResetMode::Init]
    );
    let after = manager.read(&texture, |t| t.gpu_id);
    assert!(after.is_some_and(|id| id != 0));
    assert_ne!(before, after);
    assert!(manager.get::<Texture>("t.png")?.ptr_eq(&texture));
    assert!(manager.is_usable(&proxy));
    Ok(())
}

#[test]
fn worker_thread_loads_resources_in_the_background() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new().with_worker_context(true));
    let manager = manager_at(&device, dir.path());
    manager.insert_memory_file("mem/t.png", vec![2u8; 128]);

    // --- ACT ---
    let texture = manager.load::<Texture>("t.png", UpdateMode::Auto, Some("mem/t.png"))?;
    let pending = manager.wait_for_startup(Some(Duration::from_secs(5)));

    // --- ASSERT ---
    assert!(manager.has_worker());
    assert_eq!(pending, 0);
    assert_eq!(manager.read(&texture, |t| t.bytes), Some(128));
    assert_eq!(device.worker_binds(), 1);
    // Fences created on the worker are flushed there.
    assert!(device.flush_count() >= 1);

    manager.reset(ResetMode::Exit);
    assert!(!manager.has_worker());
    assert!(!device.worker_bound());
    Ok(())
}

#[test]
fn without_worker_context_updates_run_on_the_caller() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new().with_fence_latency(3));
    let manager = manager_at(&device, dir.path());
    manager.insert_memory_file("mem/t.png", vec![2u8; 4]);
    let texture = manager.load::<Texture>("t.png", UpdateMode::Auto, Some("mem/t.png"))?;

    assert!(!manager.has_worker());
    assert_eq!(manager.wait_for_startup(Some(Duration::from_secs(5))), 0);
    assert!(manager.is_usable(&texture));
    assert_eq!(device.worker_binds(), 0);
    Ok(())
}

#[test]
fn manual_handles_load_only_when_asked() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    manager.insert_memory_file("mem/m.png", vec![1u8; 10]);
    let texture = manager.load::<Texture>("m.png", UpdateMode::Manual, Some("mem/m.png"))?;

    manager.update_resources();
    assert_eq!(texture.status(), Status::Busy);

    assert_eq!(manager.update_now(&texture), Status::Busy);
    assert_eq!(manager.update_now(&texture), Status::Ok);
    assert_eq!(manager.read(&texture, |t| t.bytes), Some(10));
    Ok(())
}

#[test]
fn anonymous_resources_are_never_shared() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());

    let first = manager.load_new::<Flag>();
    let second = manager.load_new::<Flag>();

    assert!(!first.ptr_eq(&second));
    assert!(first.is_usable());
    assert_eq!(manager.write(&first, |f| {
        f.loads = 7;
        f.loads
    }), Some(7));
    assert_eq!(manager.read(&second, |f| f.loads), Some(0));
    Ok(())
}

#[test]
fn busy_resources_fall_back_to_the_default() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    manager.insert_memory_file("mem/default.png", vec![0u8; 4]);
    manager.insert_memory_file("mem/real.png", vec![0u8; 256]);

    // --- ACT ---
    let status = manager.set_default::<Texture>(Some("mem/default.png"));
    let texture = manager.load::<Texture>("real.png", UpdateMode::Auto, Some("mem/real.png"))?;

    // --- ASSERT ---
    assert_eq!(status, Status::Ok);
    assert_eq!(manager.read(&texture, |t| t.bytes), Some(4));
    assert_eq!(manager.write(&texture, |t| t.bytes), None);

    assert!(pump_until_usable(&manager, &texture));
    assert_eq!(manager.read(&texture, |t| t.bytes), Some(256));
    Ok(())
}

#[test]
fn deferred_functions_run_until_done() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    manager.attach_function(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Status::Busy
        } else {
            Status::Ok
        }
    });

    assert_eq!(manager.update_functions(), 1);
    assert_eq!(manager.update_functions(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn archives_from_the_config_are_searched() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let mut archive = Archive::new(dir.path().join("assets.pack"));
    archive.add_file(ResourceFile::from_memory("tex/packed.png", vec![4u8; 48]))?;
    archive.save()?;

    let device = Arc::new(HeadlessDevice::new());
    let config = ManagerConfig {
        root: dir.path().to_path_buf(),
        archives: vec!["assets.pack".to_string()],
        ..Default::default()
    };
    let manager = ResourceManager::new(device, config);

    // --- ACT ---
    let texture = manager.load::<Texture>("packed", UpdateMode::Auto, Some("tex/packed.png"))?;
    let pending = manager.wait_for_startup(Some(Duration::from_secs(5)));

    // --- ASSERT ---
    assert_eq!(pending, 0);
    assert_eq!(manager.retrieve_archive("assets.pack").len(), 1);
    assert_eq!(manager.read(&texture, |t| t.bytes), Some(48));
    Ok(())
}

#[test]
fn reshape_reaches_relation_objects() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    let device = Arc::new(HeadlessDevice::new());
    let manager = manager_at(&device, dir.path());
    let observer = recorder(&manager);

    manager.reshape();
    manager.reshape();

    assert_eq!(observer.reshapes.load(Ordering::SeqCst), 2);
    assert_eq!(manager.resets().len(), 1);
    drop(observer);
    assert!(manager.resets().is_empty());
    Ok(())
}
