use std::fs;

use hashdb::{Error, Geometry, HashDb, HashDbConfig, HEADER_SIZE, Header, Validation};
use tempfile::tempdir;

fn trimmed(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

#[test]
fn full_table_frees_a_slot_on_remove() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.db");
    let mut db = HashDb::create(&path, &HashDbConfig::new(4, 4, 64, 64)).unwrap();

    db.set(b"ethan", b"dumbass").unwrap();
    db.set(b"chris", b"boywonder").unwrap();
    db.set(b"sonny", b"legend").unwrap();
    db.set(b"jon", b"gamer").unwrap();

    let err = db.set(b"luke", b"og").unwrap_err();
    assert!(matches!(err, Error::OutOfSpace));
    assert!(!db.contains_key(b"luke").unwrap());

    db.remove(b"ethan").unwrap();
    db.set(b"luke", b"og").unwrap();

    assert!(db.get(b"ethan").unwrap_err().is_not_found());
    assert_eq!(trimmed(db.get(b"luke").unwrap().value()), b"og");
    assert_eq!(db.len().unwrap(), 4);
    db.check_integrity().unwrap();
    db.close(false).unwrap();

    let db = HashDb::open(&path, Validation::Sane).unwrap();
    assert_eq!(db.len().unwrap(), 4);
    assert!(db.get(b"ethan").unwrap_err().is_not_found());
    let survivors: [(&[u8], &[u8]); 4] = [
        (b"chris", b"boywonder"),
        (b"sonny", b"legend"),
        (b"jon", b"gamer"),
        (b"luke", b"og"),
    ];
    for (key, value) in survivors {
        assert_eq!(trimmed(db.get(key).unwrap().value()), value);
    }
    assert_eq!(db.stats().unwrap().free_list_len, 0);
    db.check_integrity().unwrap();
    db.close(true).unwrap();
}

#[test]
fn handles_opened_before_a_write_keep_working() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let mut writer = HashDb::create(&path, &HashDbConfig::new(4, 4, 64, 64)).unwrap();
    let reader = HashDb::open(&path, Validation::Sane).unwrap();

    writer.set(b"live", b"yes").unwrap();
    assert_eq!(trimmed(reader.get(b"live").unwrap().value()), b"yes");

    let mut out = Vec::new();
    reader.dump(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("freelistlen: 3\n"));

    reader.close(false).unwrap();
    writer.close(true).unwrap();
    assert!(!path.exists());
}

#[test]
fn file_size_follows_the_geometry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sized.db");
    let db = HashDb::create(&path, &HashDbConfig::new(4, 4, 60, 61)).unwrap();

    // sizes round up to 64, slot = 8 + 64 + 64
    let geometry = *db.geometry();
    let header = db.header();
    assert_eq!(geometry.slot_size, 136);
    assert_eq!(geometry.arena_offset, HEADER_SIZE);
    assert_eq!(geometry.bucket_offset, 40 + 5 * 136);
    assert_eq!(geometry.file_size, 40 + 5 * 136 + 4 * 8);
    db.close(false).unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), geometry.file_size as u64);

    let reopened = HashDb::open(&path, Validation::Sane).unwrap();
    assert_eq!(*reopened.geometry(), geometry);
    assert_eq!(reopened.header(), header);
    assert_eq!((reopened.key_size(), reopened.value_size()), (64, 64));
    assert_eq!(reopened.capacity(), 4);
    assert_eq!(reopened.bucket_count(), 4);
    reopened.close(true).unwrap();
}

#[test]
fn header_bytes_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("header.db");
    let mut db = HashDb::create(&path, &HashDbConfig::new(3, 2, 8, 16)).unwrap();
    db.set(b"k", b"v").unwrap();
    db.close(false).unwrap();

    let bytes = fs::read(&path).unwrap();
    let header = Header::read(&bytes).unwrap();
    assert_eq!(header.node_capacity, 3);
    assert_eq!(header.bucket_count, 2);
    assert_eq!(header.key_size, 8);
    assert_eq!(header.value_size, 16);
    assert_eq!(header.free_head, 2);

    let field = |i: usize| u64::from_ne_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
    assert_eq!(
        [field(0), field(1), field(2), field(3), field(4)],
        [3, 2, 8, 16, 2]
    );

    let geometry = Geometry::from_header(&header).unwrap();
    assert_eq!(bytes.len(), geometry.file_size);
    // reserved slot 0 stays zeroed
    assert!(bytes[geometry.slot_range(0)].iter().all(|&b| b == 0));
}

#[test]
fn many_entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("many.db");
    let config = HashDbConfig::new(1000, 97, 16, 16);

    let mut db = HashDb::create(&path, &config).unwrap();
    for i in 0..1000u32 {
        db.set(format!("key{i}").as_bytes(), format!("value{i}").as_bytes())
            .unwrap();
    }
    for i in (0..1000u32).step_by(3) {
        db.remove(format!("key{i}").as_bytes()).unwrap();
    }
    db.flush().unwrap();
    db.close(false).unwrap();

    let db = HashDb::open(&path, Validation::Sane).unwrap();
    db.check_integrity().unwrap();
    assert_eq!(db.len().unwrap(), 1000 - 334);
    for i in 0..1000u32 {
        let key = format!("key{i}");
        if i % 3 == 0 {
            assert!(!db.contains_key(key.as_bytes()).unwrap());
        } else {
            let value = db.get(key.as_bytes()).unwrap();
            assert_eq!(trimmed(value.value()), format!("value{i}").as_bytes());
        }
    }
    assert_eq!(db.iter().count(), 1000 - 334);

    let stats = db.stats().unwrap();
    assert_eq!(stats.free_list_len, 334);
    assert_eq!(stats.occupied, 666);
    db.close(true).unwrap();
}

#[test]
fn close_with_destroy_removes_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.db");
    let db = HashDb::create(&path, &HashDbConfig::new(2, 2, 8, 8)).unwrap();
    assert!(path.exists());
    db.close(true).unwrap();
    assert!(!path.exists());

    let err = HashDb::open(&path, Validation::Sane).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn create_truncates_an_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("again.db");
    let mut db = HashDb::create(&path, &HashDbConfig::new(8, 4, 8, 8)).unwrap();
    db.set(b"old", b"data").unwrap();
    db.close(false).unwrap();

    let db = HashDb::create(&path, &HashDbConfig::new(2, 1, 8, 8)).unwrap();
    assert!(db.is_empty().unwrap());
    assert!(!db.contains_key(b"old").unwrap());
    db.close(true).unwrap();
}

#[test]
fn open_rejects_corrupt_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.db");
    HashDb::create(&path, &HashDbConfig::new(4, 4, 8, 8))
        .unwrap()
        .close(false)
        .unwrap();
    let pristine = fs::read(&path).unwrap();

    // key_size not a multiple of 8
    let mut bytes = pristine.clone();
    bytes[16..24].copy_from_slice(&7u64.to_ne_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        HashDb::open(&path, Validation::Sane),
        Err(Error::Corrupted(_))
    ));

    // free list head beyond capacity
    let mut bytes = pristine.clone();
    bytes[32..40].copy_from_slice(&99u64.to_ne_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        HashDb::open(&path, Validation::Sane),
        Err(Error::Corrupted(_))
    ));

    // zero buckets
    let mut bytes = pristine;
    bytes[8..16].copy_from_slice(&0u64.to_ne_bytes());
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        HashDb::open(&path, Validation::Sane),
        Err(Error::Corrupted(_))
    ));
}

#[test]
fn trusted_handle_behaves_like_a_sane_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trusted.db");
    let config = HashDbConfig::new(4, 2, 8, 8).with_validation(Validation::Trusted);
    let mut db = HashDb::create(&path, &config).unwrap();
    assert_eq!(db.validation(), Validation::Trusted);

    db.set(b"a", b"1").unwrap();
    db.set(b"b", b"2").unwrap();
    db.remove(b"a").unwrap();
    assert_eq!(db.len().unwrap(), 1);
    db.close(false).unwrap();

    let db = HashDb::open(&path, Validation::Trusted).unwrap();
    assert_eq!(trimmed(db.get(b"b").unwrap().value()), b"2");
    db.check_integrity().unwrap();
    db.close(true).unwrap();
}

#[cfg(unix)]
#[test]
fn created_file_uses_requested_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("private.db");
    let config = HashDbConfig::new(2, 2, 8, 8).with_permissions(0o600);
    HashDb::create(&path, &config).unwrap().close(false).unwrap();
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn dump_prints_header_and_free_list() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dump.db");
    let mut db = HashDb::create(&path, &HashDbConfig::new(8192, 4096, 128, 8)).unwrap();
    db.set(b"hello", &1u64.to_ne_bytes()).unwrap();

    let mut out = Vec::new();
    db.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "nr_nodes:    8192",
            "nr_buckets:  4096",
            "key_size:    128",
            "value_size:  8",
            "free:        2",
            "freelistlen: 8191",
        ]
    );
    db.close(true).unwrap();
}
