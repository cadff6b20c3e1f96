use super::*;
use crate::device::MemDevice;
use crate::layout::constants::{DATA_UNITS_PER_OBJECT, MAGIC, NAME_LEN, ROOT_INO};
use crate::record::FileType;

const DEV_LEN: usize = 64 * 1024;

fn device() -> MemDevice {
    MemDevice::new(DEV_LEN, 512).expect("device")
}

fn mount(dev: &MemDevice) -> FileSystem {
    FileSystem::mount_device(Box::new(dev.reopen())).expect("mount")
}

fn mount_err(dev: &MemDevice) -> FsError {
    match FileSystem::mount_device(Box::new(dev.reopen())) {
        Ok(_) => panic!("mount should fail"),
        Err(err) => err,
    }
}

#[test]
fn first_mount_lays_out_and_allocates_root() {
    let dev = device();
    let fs = mount(&dev);

    assert!(fs.is_mounted());
    assert_eq!(fs.super_block().max_ino, 8);
    assert_eq!(fs.super_block().usage, 7);
    assert!(fs.inode_map().get(ROOT_INO));
    assert_eq!(fs.inode_map().count_set(), 1);
    assert_eq!(fs.data_map().count_set(), DATA_UNITS_PER_OBJECT);

    let root = fs.entry(fs.root());
    assert_eq!(root.ino, Some(ROOT_INO));
    assert_eq!(root.record, Some(ROOT_INO));
    assert_eq!(&dev.snapshot(0, 4), &MAGIC.to_le_bytes());
}

#[test]
fn first_mount_ignores_stale_bitmap_bytes() {
    let dev = device();
    dev.poke(1024, &[0xff; 16]);
    dev.poke(2048, &[0xff; 16]);
    let fs = mount(&dev);
    assert_eq!(fs.inode_map().count_set(), 1);
    assert_eq!(fs.data_map().count_set(), DATA_UNITS_PER_OBJECT);
}

#[test]
fn lookups_on_empty_filesystem() {
    let dev = device();
    let mut fs = mount(&dev);

    let hit = fs.lookup("/").expect("root");
    assert_eq!(hit.entry, fs.root());
    assert!(hit.found && hit.is_root);

    let hit = fs.lookup("/missing").expect("missing");
    assert_eq!(hit.entry, fs.root());
    assert!(!hit.found && !hit.is_root);
}

#[test]
fn nested_directories_survive_remount() {
    let dev = device();
    let mut fs = mount(&dev);
    let a = fs.create_node("/", "a", FileType::Directory).expect("mkdir a");
    let b = fs.create_node("/a", "b", FileType::Directory).expect("mkdir b");
    fs.unmount().expect("unmount");

    let mut fs = mount(&dev);
    let hit = fs.lookup("/a/b").expect("lookup");
    assert!(hit.found);
    assert_eq!(fs.entry(hit.entry).ino, Some(b));
    assert_eq!(fs.record(b).map(|r| r.child_count), Some(0));

    let hit = fs.lookup("/a").expect("lookup a");
    assert_eq!(fs.entry(hit.entry).ino, Some(a));
    assert_eq!(fs.record(a).map(|r| r.child_count), Some(1));
    assert_eq!(fs.super_block().usage, 21);
}

#[test]
fn allocation_stops_at_max_ino() {
    let dev = device();
    let mut fs = mount(&dev);
    let mut created = 0u32;
    loop {
        match fs.create_node("/", &format!("f{created}"), FileType::Regular) {
            Ok(_) => created += 1,
            Err(FsError::NoSpace) => break,
            Err(err) => panic!("unexpected {err}"),
        }
    }
    assert_eq!(created + 1, fs.super_block().max_ino);
    assert_eq!(fs.inode_map().count_set(), fs.super_block().max_ino);
    assert_eq!(fs.data_map().count_set(), fs.super_block().max_data);
}

#[test]
fn data_unit_shortage_rolls_back_index_bit() {
    let dev = device();
    let mut fs = mount(&dev);
    while fs.data_map.count_set() < fs.super_block().max_data - 3 {
        fs.data_map.allocate().expect("fill");
    }
    let before_index = fs.inode_map().count_set();
    let before_data = fs.data_map().count_set();
    let before_usage = fs.super_block().usage;

    let err = fs.create_node("/", "f", FileType::Regular);
    assert!(matches!(err, Err(FsError::NoSpace)));
    assert_eq!(fs.inode_map().count_set(), before_index);
    assert_eq!(fs.data_map().count_set(), before_data);
    assert_eq!(fs.super_block().usage, before_usage);
}

#[test]
fn sync_twice_is_byte_identical() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "d", FileType::Directory).expect("mkdir");
    fs.create_node("/d", "f", FileType::Regular).expect("touch");

    fs.sync_index_record(ROOT_INO).expect("first sync");
    let first = dev.snapshot(0, DEV_LEN);
    fs.sync_index_record(ROOT_INO).expect("second sync");
    assert_eq!(dev.snapshot(0, DEV_LEN), first);
}

#[test]
fn reload_reverses_child_order() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "x", FileType::Regular).expect("x");
    fs.create_node("/", "y", FileType::Regular).expect("y");
    let names = |fs: &FileSystem| -> Vec<String> {
        fs.tree()
            .children(ROOT_INO)
            .map(|id| fs.entry(id).name.clone())
            .collect()
    };
    assert_eq!(names(&fs), ["y", "x"]);
    fs.unmount().expect("unmount");

    let fs = mount(&dev);
    assert_eq!(names(&fs), ["x", "y"]);
}

#[test]
fn file_contents_persist() {
    let dev = device();
    let mut fs = mount(&dev);
    let ino = fs.create_node("/", "notes", FileType::Regular).expect("touch");
    assert_eq!(fs.file_data(ino).expect("data").len(), fs.super_block().data_area_size());

    fs.file_data_mut(ino).expect("data")[..5].copy_from_slice(b"hello");
    fs.set_size(ino, 5).expect("size");
    fs.unmount().expect("unmount");

    let mut fs = mount(&dev);
    let hit = fs.lookup("/notes").expect("lookup");
    assert!(hit.found);
    let ino = fs.entry(hit.entry).ino.expect("bound");
    let record = fs.record(ino).expect("loaded");
    assert_eq!(record.size, 5);
    assert_eq!(&fs.file_data(ino).expect("data")[..5], b"hello");
}

#[test]
fn set_size_is_bounded_by_data_area() {
    let dev = device();
    let mut fs = mount(&dev);
    let ino = fs.create_node("/", "f", FileType::Regular).expect("touch");
    let limit = fs.super_block().data_area_size() as u32;
    assert!(fs.set_size(ino, limit).is_ok());
    assert!(matches!(fs.set_size(ino, limit + 1), Err(FsError::NoSpace)));
    assert!(matches!(fs.set_size(ROOT_INO, 1), Err(FsError::Unsupported(_))));
}

#[test]
fn lookup_through_a_file_reports_not_dir() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "f", FileType::Regular).expect("touch");
    let hit = fs.lookup("/f/g").expect("lookup");
    assert!(!hit.found);
    assert!(hit.not_dir);
    assert_eq!(fs.entry(hit.entry).name, "f");
}

#[test]
fn create_node_rejects_bad_requests() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "f", FileType::Regular).expect("touch");

    assert!(matches!(
        fs.create_node("/", "f", FileType::Directory),
        Err(FsError::Exists(_))
    ));
    assert!(matches!(
        fs.create_node("/f", "g", FileType::Regular),
        Err(FsError::NotDirectory)
    ));
    assert!(matches!(
        fs.create_node("/nope", "g", FileType::Regular),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        fs.create_node("/", &"n".repeat(NAME_LEN + 1), FileType::Regular),
        Err(FsError::NameTooLong)
    ));
    for bad in ["", ".", "..", "a/b", "a\0b"] {
        let err = fs
            .create_node("/", bad, FileType::Regular)
            .expect_err("invalid name");
        assert!(matches!(err, FsError::InvalidName(_)), "{bad:?}: {err}");
        assert_eq!(err.to_errno(), libc::EINVAL);
    }
    assert_eq!(fs.inode_map().count_set(), 2);
}

#[test]
fn duplicate_name_reports_full_path() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "a", FileType::Directory).expect("mkdir a");
    fs.create_node("/a", "b", FileType::Regular).expect("touch b");
    match fs.create_node("/a", "b", FileType::Directory) {
        Err(FsError::Exists(path)) => assert_eq!(path, "/a/b"),
        other => panic!("expected Exists, got {other:?}"),
    }
}

#[test]
fn read_failure_during_lazy_load_leaves_entry_unloaded() {
    let dev = device();
    let mut fs = mount(&dev);
    let a = fs.create_node("/", "a", FileType::Directory).expect("mkdir a");
    let b = fs.create_node("/a", "b", FileType::Directory).expect("mkdir b");
    fs.unmount().expect("unmount");

    let mut fs = mount(&dev);
    let entry = fs.tree().find_child(ROOT_INO, "a").expect("a listed under root");
    dev.fail_reads_after(0);
    assert!(matches!(fs.lookup("/a/b"), Err(FsError::Io(_))));
    assert_eq!(fs.entry(entry).record, None);
    assert!(fs.record(a).is_none());

    dev.clear_faults();
    let hit = fs.lookup("/a/b").expect("retry");
    assert!(hit.found);
    assert_eq!(fs.entry(hit.entry).ino, Some(b));
    assert_eq!(fs.entry(entry).record, Some(a));
    assert_eq!(fs.record(a).map(|r| r.child_count), Some(1));
}

#[test]
fn overfull_directory_fails_sync() {
    let dev = device();
    let mut fs = mount(&dev);
    for i in 0..=fs.dir_capacity() {
        let entry = fs.tree.new_entry(format!("e{i}"), FileType::Regular, None);
        fs.add_child_entry(ROOT_INO, entry).expect("add");
    }
    assert!(matches!(
        fs.sync_index_record(ROOT_INO),
        Err(FsError::NoSpace)
    ));
    assert!(matches!(
        fs.create_node("/", "late", FileType::Regular),
        Err(FsError::NoSpace)
    ));
}

#[test]
fn symlink_target_is_stored_not_followed() {
    let dev = device();
    let mut fs = mount(&dev);
    let ino = fs.create_node("/", "ln", FileType::Symlink).expect("link");
    fs.set_link_target(ino, "/elsewhere").expect("target");
    assert!(matches!(
        fs.set_link_target(ino, &"t".repeat(NAME_LEN + 1)),
        Err(FsError::NameTooLong)
    ));
    assert!(matches!(
        fs.set_link_target(ino, "/x\0y"),
        Err(FsError::InvalidName(_))
    ));
    assert!(matches!(
        fs.set_link_target(ROOT_INO, "/x"),
        Err(FsError::Unsupported(_))
    ));
    fs.unmount().expect("unmount");

    let mut fs = mount(&dev);
    let hit = fs.lookup("/ln").expect("lookup");
    let ino = fs.entry(hit.entry).ino.expect("bound");
    assert_eq!(fs.link_target(ino).expect("target"), "/elsewhere");
    assert!(matches!(fs.lookup("/ln/x"), Err(FsError::Unsupported(_))));
}

#[test]
fn unmount_is_idempotent_and_releases_once() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.unmount().expect("unmount");
    fs.unmount().expect("second unmount");
    assert_eq!(dev.closes(), 1);
    assert!(!fs.is_mounted());
    assert!(matches!(fs.lookup("/"), Err(FsError::NotMounted)));
    drop(fs);
    assert_eq!(dev.closes(), 1);
}

#[test]
fn unmount_write_failure_still_releases() {
    let dev = device();
    let mut fs = mount(&dev);
    fs.create_node("/", "a", FileType::Directory).expect("mkdir");
    dev.fail_writes_after(0);
    assert!(matches!(fs.unmount(), Err(FsError::Io(_))));
    assert_eq!(dev.closes(), 1);
}

#[test]
fn failed_mount_releases_device_once() {
    let dev = device();
    dev.fail_reads_after(0);
    assert!(matches!(mount_err(&dev), FsError::Io(_)));
    assert_eq!(dev.closes(), 1);

    let tiny = MemDevice::new(4 * 1024, 512).expect("device");
    assert!(matches!(mount_err(&tiny), FsError::InvalidGeometry(_)));
    assert_eq!(tiny.closes(), 1);
}

#[test]
fn failure_while_reading_root_releases_device() {
    let dev = device();
    drop(mount(&dev));
    let closes = dev.closes();
    // one unit for the super block, two per bitmap, then the root record
    dev.fail_reads_after(5);
    assert!(matches!(mount_err(&dev), FsError::Io(_)));
    assert_eq!(dev.closes(), closes + 1);
}

#[test]
fn corrupt_super_block_is_rejected() {
    let dev = device();
    drop(mount(&dev));
    // point the data bitmap at the index bitmap
    dev.poke(32, &1024u64.to_le_bytes());
    assert!(matches!(mount_err(&dev), FsError::Corrupt(_)));
}
