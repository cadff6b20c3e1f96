use super::{BlockDevice, ImageDevice, MemDevice};
use rand::RngCore;
use tempfile::NamedTempFile;

const IO: usize = 512;
const DISK_LEN: u64 = 64 * 1024;

#[test]
fn create_sizes_backing_file() {
    let tf = NamedTempFile::new().expect("tmp file");
    let dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
    assert_eq!(dev.len(), DISK_LEN);
    assert_eq!(dev.size(), DISK_LEN);
    assert_eq!(dev.io_size(), IO);
    let meta = std::fs::metadata(tf.path()).expect("metadata");
    assert_eq!(meta.len(), DISK_LEN, "backing file must be pre-sized");
}

#[test]
fn create_rejects_ragged_length() {
    let tf = NamedTempFile::new().expect("tmp file");
    assert!(ImageDevice::create(tf.path(), DISK_LEN + 3, IO).is_err());
    assert!(ImageDevice::create(tf.path(), DISK_LEN, 500).is_err());
}

#[test]
fn open_rejects_empty_image() {
    let tf = NamedTempFile::new().expect("tmp file");
    assert!(ImageDevice::open(tf.path(), IO).is_err());
}

#[test]
fn unit_reads_start_zeroed_and_advance_cursor() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
    let mut unit = vec![0xAAu8; IO];
    dev.seek(0).expect("seek");
    assert_eq!(dev.read(&mut unit).expect("read"), IO);
    assert!(unit.iter().all(|&b| b == 0));

    let payload = vec![7u8; IO];
    dev.write(&payload).expect("write second unit");
    dev.seek(IO as u64).expect("seek back");
    dev.read(&mut unit).expect("read second unit");
    assert_eq!(unit, payload);
}

#[test]
fn partial_units_are_rejected() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
    let mut short = vec![0u8; IO - 1];
    assert!(dev.read(&mut short).is_err());
}

#[test]
fn transfers_past_the_end_fail() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
    dev.seek(DISK_LEN).expect("seek to end is allowed");
    let mut unit = vec![0u8; IO];
    let err = dev.read(&mut unit).expect_err("read past end");
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    assert!(dev.seek(DISK_LEN + 1).is_err());
}

#[test]
fn contents_survive_close_and_reopen() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut data = vec![0u8; IO];
    rand::rng().fill_bytes(&mut data);
    {
        let mut dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
        dev.seek(8 * IO as u64).expect("seek");
        dev.write(&data).expect("write");
        dev.close().expect("close");
        assert!(!dev.is_open());
        dev.close().expect("second close is a no-op");
    }
    let mut dev = ImageDevice::open(tf.path(), IO).expect("reopen");
    assert_eq!(dev.len(), DISK_LEN);
    let mut back = vec![0u8; IO];
    dev.seek(8 * IO as u64).expect("seek");
    dev.read(&mut back).expect("read");
    assert_eq!(back, data);
}

#[test]
fn closed_image_refuses_io() {
    let tf = NamedTempFile::new().expect("tmp file");
    let mut dev = ImageDevice::create(tf.path(), DISK_LEN, IO).expect("create");
    dev.close().expect("close");
    let mut unit = vec![0u8; IO];
    assert!(dev.read(&mut unit).is_err());
}

#[test]
fn mem_device_counts_and_shares_storage() {
    let dev = MemDevice::new(DISK_LEN as usize, IO).expect("mem device");
    let mut handle = dev.reopen();
    handle.seek(IO as u64).expect("seek");
    handle.write(&[9u8; IO]).expect("write");
    assert_eq!(dev.writes(), 1);
    assert_eq!(dev.snapshot(IO, 4), vec![9u8; 4]);

    handle.close().expect("close");
    handle.close().expect("close twice");
    assert_eq!(dev.closes(), 1, "release is counted once per handle");
}

#[test]
fn mem_device_injects_faults() {
    let dev = MemDevice::new(DISK_LEN as usize, IO).expect("mem device");
    let mut handle = dev.reopen();
    dev.fail_reads_after(1);
    let mut unit = vec![0u8; IO];
    handle.read(&mut unit).expect("first read passes");
    assert!(handle.read(&mut unit).is_err());
    dev.clear_faults();
    handle.seek(0).expect("seek");
    handle.read(&mut unit).expect("faults cleared");

    dev.fail_writes_after(0);
    assert!(handle.write(&unit).is_err());
}
