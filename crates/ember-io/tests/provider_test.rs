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

use ember_io::{Archive, ArchiveError, FileOrigin, FileProvider, ResourceFile};
use std::error::Error;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn loose_file_wins_over_archive_entry() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let mut archive = Archive::new(dir.path().join("data.pack"));
    archive.add_file(ResourceFile::from_memory("data/x.vs", b"packed".to_vec()))?;
    archive.add_file(ResourceFile::from_memory("data/y.fs", b"only packed".to_vec()))?;
    archive.save()?;

    std::fs::create_dir_all(dir.path().join("data"))?;
    std::fs::write(dir.path().join("data/x.vs"), b"loose")?;

    let mut provider = FileProvider::new(dir.path());
    let opened = provider.retrieve_archive("data.pack");
    assert_eq!(opened.len(), 2);

    // --- ACT ---
    let x = provider.retrieve_file("data/x.vs");
    let y = provider.retrieve_file("data/y.fs");

    // --- ASSERT ---
    assert!(matches!(x.origin(), FileOrigin::Loose(_)));
    assert_eq!(&x.data()?[..], b"loose");
    assert!(matches!(y.origin(), FileOrigin::Archive { .. }));
    assert_eq!(&y.data()?[..], b"only packed");
    Ok(())
}

#[test]
fn edited_archive_round_trips_through_disk() -> Result<(), Box<dyn Error>> {
    init_logging();

    // --- ARRANGE ---
    let dir = tempdir()?;
    let loose = dir.path().join("font.ttf");
    std::fs::write(&loose, [7u8; 40])?;

    let path = dir.path().join("assets.pack");
    let mut archive = Archive::new(&path);
    archive.add_loose("fonts/default.ttf", &loose)?;
    archive.add_file(ResourceFile::from_memory("tmp.bin", vec![1u8, 2, 3]))?;
    archive.save()?;

    // --- ACT ---
    let mut reopened = Archive::open(&path)?;
    reopened.remove_file("tmp.bin")?;
    reopened.add_file(ResourceFile::from_memory("shaders/a.vs", b"main".to_vec()))?;
    reopened.save()?;
    let final_archive = Archive::open(&path)?;

    // --- ASSERT ---
    let names: Vec<_> = final_archive.paths().collect();
    assert_eq!(names, vec!["fonts/default.ttf", "shaders/a.vs"]);
    assert_eq!(final_archive.file("fonts/default.ttf").unwrap().data()?.len(), 40);
    assert_eq!(&final_archive.file("shaders/a.vs").unwrap().data()?[..], b"main");
    assert!(matches!(
        final_archive_remove(&path),
        Err(ArchiveError::NotFound(_))
    ));
    Ok(())
}

fn final_archive_remove(path: &std::path::Path) -> Result<(), ArchiveError> {
    let mut archive = Archive::open(path)?;
    archive.remove_file("tmp.bin").map(|_| ())
}

#[test]
fn released_data_reloads_transparently() -> Result<(), Box<dyn Error>> {
    init_logging();

    let dir = tempdir()?;
    std::fs::write(dir.path().join("tex.png"), [3u8; 64])?;
    let mut provider = FileProvider::new(dir.path());

    let file = provider.retrieve_file("tex.png");
    assert_eq!(file.data()?.len(), 64);
    assert!(file.is_loaded());

    assert_eq!(provider.release_data(), 1);
    assert!(!file.is_loaded());
    assert_eq!(file.data()?.len(), 64);
    Ok(())
}

#[test]
fn truncated_archive_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("cut.pack");
    let mut archive = Archive::new(&path);
    archive.add_file(ResourceFile::from_memory("big.bin", vec![0u8; 128]))?;
    archive.save()?;

    let bytes = std::fs::read(&path)?;
    std::fs::write(&path, &bytes[..bytes.len() - 10])?;

    assert!(matches!(
        Archive::open(&path),
        Err(ArchiveError::Truncated { .. })
    ));
    Ok(())
}
