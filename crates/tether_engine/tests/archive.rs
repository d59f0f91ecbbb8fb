use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tether_core::{LocalFailure, LocalOp, LocalReply};
use tether_engine::{ArchiveError, ArchiveStore, LocalWorkspace};

#[test]
fn entries_read_back_in_stored_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("backup.zip");
    let mut store = ArchiveStore::new();

    store.create(&path).unwrap();
    store.append("main.py", b"print('hi')\n").unwrap();
    store.append("lib/util.py", b"def f():\n    pass\n").unwrap();
    store.append("boot.py", b"").unwrap();
    store.close().unwrap();
    assert!(!store.is_open());

    let names = store.open(&path).unwrap();
    assert_eq!(names, vec!["main.py", "lib/util.py", "boot.py"]);
    assert_eq!(store.read("lib/util.py").unwrap(), b"def f():\n    pass\n");
    assert_eq!(store.read("boot.py").unwrap(), b"");
    store.close().unwrap();
}

#[test]
fn mode_and_state_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("b.zip");
    let mut store = ArchiveStore::new();

    assert!(matches!(store.read("x"), Err(ArchiveError::NotOpen)));
    assert!(matches!(store.close(), Err(ArchiveError::NotOpen)));

    store.create(&path).unwrap();
    assert!(matches!(store.create(&path), Err(ArchiveError::AlreadyOpen)));
    assert!(matches!(store.read("x"), Err(ArchiveError::WrongMode(_))));
    store.close().unwrap();

    store.open(&path).unwrap();
    assert!(matches!(store.read("missing.py"), Err(ArchiveError::Zip(_))));
    assert!(matches!(store.append("x", b"1"), Err(ArchiveError::WrongMode(_))));
}

#[test]
fn discard_keeps_what_was_written() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("partial.zip");
    let mut store = ArchiveStore::new();

    store.create(&path).unwrap();
    store.append("main.py", b"x").unwrap();
    store.discard();
    assert!(!store.is_open());

    assert_eq!(store.open(&path).unwrap(), vec!["main.py"]);
    assert_eq!(store.read("main.py").unwrap(), b"x");
    store.discard();
    assert!(!store.is_open());
}

#[test]
fn workspace_maps_operations_and_failures() {
    let temp = TempDir::new().unwrap();
    let mut workspace = LocalWorkspace::new();
    let local = temp.path().join("notes.txt");
    fs::write(&local, "hello").unwrap();

    assert_eq!(
        workspace.execute(LocalOp::ReadHostFile { path: local.clone() }),
        Ok(LocalReply::Data(b"hello".to_vec()))
    );
    assert!(matches!(
        workspace.execute(LocalOp::ReadHostFile {
            path: temp.path().join("absent.txt")
        }),
        Err(LocalFailure::HostFile(_))
    ));
    assert!(matches!(
        workspace.execute(LocalOp::CloseArchive),
        Err(LocalFailure::Archive(_))
    ));

    let exported = temp.path().join("out").join("copy.txt");
    assert_eq!(
        workspace.execute(LocalOp::WriteHostFile {
            path: exported.clone(),
            bytes: b"copy".to_vec()
        }),
        Ok(LocalReply::Done)
    );
    assert_eq!(fs::read(&exported).unwrap(), b"copy");

    workspace
        .execute(LocalOp::CreateArchive {
            path: temp.path().join("a.zip"),
        })
        .unwrap();
    assert!(workspace.has_open_archive());
    workspace.discard_archive();
    assert!(!workspace.has_open_archive());
}
