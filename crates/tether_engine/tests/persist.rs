use std::fs;

use tempfile::TempDir;
use tether_engine::{ensure_dir, AtomicFileWriter};

#[test]
fn creates_missing_target_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("exports");
    assert!(!new_dir.exists());
    ensure_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_content() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("nested").join("main.py");

    AtomicFileWriter::write(&target, b"print(1)").unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"print(1)");

    AtomicFileWriter::write(&target, b"print(2)").unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"print(2)");
    assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_when_parent_is_a_file() {
    let temp = TempDir::new().unwrap();
    let not_a_dir = temp.path().join("not_a_dir");
    fs::write(&not_a_dir, "x").unwrap();

    let result = AtomicFileWriter::write(&not_a_dir.join("main.py"), b"data");
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&not_a_dir).unwrap(), "x");
}
