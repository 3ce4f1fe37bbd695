use super::*;
use crate::index::Index;
use tempfile::tempdir;

#[test]
fn load_missing_file_is_empty_not_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rdb");
    let index = Index::new();
    assert!(load(&path, &index).is_ok());
    assert_eq!(index.len(), 0);
}

#[test]
fn dump_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rdb");
    let index = Index::new();
    for key in 0..100 {
        index.save(key, format!("value-{key}").as_bytes());
    }

    dump(&path, &index).unwrap();
    // The dump forks on Unix; give the child a moment to finish the rename.
    #[cfg(unix)]
    std::thread::sleep(std::time::Duration::from_millis(200));

    let reloaded = Index::new();
    load(&path, &reloaded).unwrap();
    assert_eq!(reloaded.len(), 100);
    for key in 0..100 {
        assert_eq!(
            reloaded.get_owned(key),
            Some(format!("value-{key}").into_bytes())
        );
    }
}

#[test]
fn flipping_a_payload_byte_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rdb");
    let index = Index::new();
    index.save(1, b"neo");
    dump(&path, &index).unwrap();
    #[cfg(unix)]
    std::thread::sleep(std::time::Duration::from_millis(200));

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let reloaded = Index::new();
    let err = load(&path, &reloaded).unwrap_err();
    assert!(err.is_corrupt());
}

#[test]
fn short_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.rdb");
    std::fs::write(&path, b"ab").unwrap();
    let index = Index::new();
    let err = load(&path, &index).unwrap_err();
    assert!(err.is_corrupt());
}
