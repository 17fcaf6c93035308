mod common;

use chunkvault_core::parity::{Par2Cli, ReedSolomonBackend};
use chunkvault_core::read::verify::ChunkStatus;
use chunkvault_core::{
    ChunkKind, ChunkSet, ParityManager, RepairPolicy, SplitOptions, VaultError, combine_set,
    split_file, verify_chunks,
};
use common::{sample_bytes, small_bounds, test_key, write_source};
use std::fs;
use std::path::Path;

fn split_into(dir: &Path, len: usize, compress: bool) -> (Vec<u8>, ChunkSet) {
    let data = sample_bytes(len, 31);
    let src = write_source(dir, "src.bin", &data);
    let opts = SplitOptions {
        compress,
        encrypt: true,
        key: Some(test_key()),
        bounds: small_bounds(),
        ..Default::default()
    };
    let set = split_file(&src, &dir.join("out"), &opts).unwrap();
    (data, set)
}

#[test]
fn parity_chunks_follow_data_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut set) = split_into(dir.path(), 20_000, false);
    let n = set.data.len() as u64;
    let rs = ReedSolomonBackend::new();
    let added = ParityManager::new(&rs).add_parity(&mut set).unwrap();

    assert_eq!(added.len(), 1);
    assert_eq!(added[0].kind, ChunkKind::Parity);
    assert_eq!(added[0].sequence, n + 1);
    added[0].verify().unwrap();

    // manifest is rewritten with the parity chunk
    let loaded = ChunkSet::load(&set.dir, &set.prefix).unwrap();
    assert_eq!(loaded.parity, added);
    assert_eq!(loaded.next_ordinal, n + 2);
    assert_eq!(loaded.parity_backend.as_deref(), Some("reed-solomon"));

    // no raw backend output is left behind
    for e in fs::read_dir(&set.dir).unwrap() {
        let name = e.unwrap().file_name().to_string_lossy().to_string();
        assert!(!name.starts_with("rs-parity-"), "{name}");
    }
}

#[test]
fn small_sets_get_no_parity() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut set) = split_into(dir.path(), 5_000, false);
    assert!(set.data.len() < 8);
    let rs = ReedSolomonBackend::new();
    assert!(ParityManager::new(&rs).add_parity(&mut set).unwrap().is_empty());
    assert!(set.parity.is_empty());
}

#[test]
fn deleted_chunk_is_rebuilt_from_reed_solomon_parity() {
    let dir = tempfile::tempdir().unwrap();
    let (data, mut set) = split_into(dir.path(), 20_000, true);
    let rs = ReedSolomonBackend::new();
    let manager = ParityManager::new(&rs).with_ratio(0.3);
    manager.add_parity(&mut set).unwrap();
    assert!(set.parity.len() >= 2);

    fs::remove_file(&set.data[1].path).unwrap();
    let mut raw = fs::read(&set.data[3].path).unwrap();
    raw[0] ^= 0xff;
    fs::write(&set.data[3].path, raw).unwrap();

    let restored = dir.path().join("restored.bin");
    let report = combine_set(
        &set,
        &restored,
        Some(&test_key()),
        RepairPolicy::Always,
        Some(&manager),
    )
    .unwrap();
    assert!(report.repaired);
    assert_eq!(fs::read(&restored).unwrap(), data);
    assert!(verify_chunks(&set.data).unwrap().is_clean());

    // prepared parity files and backups are cleaned up
    for e in fs::read_dir(&set.dir).unwrap() {
        let name = e.unwrap().file_name().to_string_lossy().to_string();
        assert!(!name.ends_with(".par2") && !name.ends_with(".1"), "{name}");
    }
}

#[test]
fn on_failure_policy_skips_clean_sets() {
    let dir = tempfile::tempdir().unwrap();
    let (data, mut set) = split_into(dir.path(), 20_000, false);
    let rs = ReedSolomonBackend::new();
    let manager = ParityManager::new(&rs);
    manager.add_parity(&mut set).unwrap();

    let restored = dir.path().join("restored.bin");
    let report = combine_set(
        &set,
        &restored,
        Some(&test_key()),
        RepairPolicy::OnChecksumFailure,
        Some(&manager),
    )
    .unwrap();
    assert!(!report.repaired);
    assert_eq!(fs::read(&restored).unwrap(), data);
}

#[test]
fn never_policy_leaves_damage_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut set) = split_into(dir.path(), 20_000, false);
    let rs = ReedSolomonBackend::new();
    let manager = ParityManager::new(&rs);
    manager.add_parity(&mut set).unwrap();
    fs::remove_file(&set.data[0].path).unwrap();

    let err = combine_set(
        &set,
        &dir.path().join("restored.bin"),
        Some(&test_key()),
        RepairPolicy::Never,
        Some(&manager),
    )
    .unwrap_err();
    assert!(matches!(err, VaultError::Io(_)));
}

#[test]
fn too_much_damage_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut set) = split_into(dir.path(), 20_000, false);
    let rs = ReedSolomonBackend::new();
    let manager = ParityManager::new(&rs);
    manager.add_parity(&mut set).unwrap();
    assert_eq!(set.parity.len(), 1);
    fs::remove_file(&set.data[0].path).unwrap();
    fs::remove_file(&set.data[1].path).unwrap();

    let report = verify_chunks(&set.data).unwrap();
    assert_eq!(report.damaged().count(), 2);
    assert!(report.damaged().all(|(_, s)| *s == ChunkStatus::Missing));

    let err = combine_set(
        &set,
        &dir.path().join("restored.bin"),
        Some(&test_key()),
        RepairPolicy::Always,
        Some(&manager),
    )
    .unwrap_err();
    assert!(matches!(err, VaultError::ExternalTool { .. }));
}

#[test]
fn repair_with_a_different_backend_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mut set) = split_into(dir.path(), 20_000, false);
    let rs = ReedSolomonBackend::new();
    ParityManager::new(&rs).add_parity(&mut set).unwrap();
    let loaded = ChunkSet::load(&set.dir, &set.prefix).unwrap();

    // any existing file counts as an available par2 binary; it must never run
    let fake = dir.path().join("par2");
    fs::write(&fake, b"").unwrap();
    let par2 = Par2Cli::new(&fake);
    let restored = dir.path().join("restored.bin");
    let err = combine_set(
        &loaded,
        &restored,
        Some(&test_key()),
        RepairPolicy::Always,
        Some(&ParityManager::new(&par2)),
    )
    .unwrap_err();
    match err {
        VaultError::Format(msg) => assert!(msg.contains("reed-solomon"), "{msg}"),
        other => panic!("expected format error, got {other:?}"),
    }
    assert!(!restored.exists());

    // the matching backend combines the same set
    combine_set(
        &loaded,
        &restored,
        Some(&test_key()),
        RepairPolicy::Always,
        Some(&ParityManager::new(&rs)),
    )
    .unwrap();
}

#[test]
fn par2_backend_repairs_when_installed() {
    let Some(par2) = Par2Cli::from_path() else {
        eprintln!("par2 not on PATH, skipping");
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let (data, mut set) = split_into(dir.path(), 20_000, false);
    let manager = ParityManager::new(&par2);
    let added = manager.add_parity(&mut set).unwrap();
    assert!(!added.is_empty());

    fs::remove_file(&set.data[2].path).unwrap();
    let restored = dir.path().join("restored.bin");
    let report = combine_set(
        &set,
        &restored,
        Some(&test_key()),
        RepairPolicy::Always,
        Some(&manager),
    )
    .unwrap();
    assert!(report.repaired);
    assert_eq!(fs::read(&restored).unwrap(), data);
}
