use std::env;
use std::fs;
use std::path::PathBuf;

use ecsfs::{BLOCK_SIZE, BlockDevice, FsError, Session};

use crate::{BlockFile, make, mount, open};

/// 每个测试使用各自的镜像文件
fn image(name: &str) -> PathBuf {
    env::temp_dir().join(format!("ecsfs-fuse-{}-{name}.img", std::process::id()))
}

#[test]
fn make_and_reopen() {
    let path = image("make");
    make(&path, 100).unwrap();
    assert_eq!(103 * BLOCK_SIZE as u64, fs::metadata(&path).unwrap().len());

    let mut fs = open(&path).unwrap();
    assert_eq!(100, fs.info().data_blocks);
    fs.create("hello").unwrap();
    let fd = fs.open("hello").unwrap();
    let data: Vec<u8> = (0..6000).map(|i| i as u8).collect();
    assert_eq!(Ok(6000), fs.write(fd, &data));
    fs.close(fd).unwrap();
    fs.unmount().unwrap();

    let mut fs = open(&path).unwrap();
    fs.check().unwrap();
    let fd = fs.open("hello").unwrap();
    let mut buf = vec![0; 8000];
    assert_eq!(Ok(6000), fs.read(fd, &mut buf));
    assert_eq!(data, buf[..6000]);

    fs::remove_file(path).unwrap();
}

#[test]
fn missing_image() {
    let path = image("missing");
    assert_eq!(FsError::NotMounted, open(&path).unwrap_err());
}

#[test]
fn unformatted_image() {
    let path = image("blank");
    BlockFile::create(&path, 8).unwrap();
    assert_eq!(FsError::InvalidFormat, open(&path).unwrap_err());

    fs::write(&path, [0u8; 100]).unwrap();
    assert!(BlockFile::open(&path).is_err());

    fs::remove_file(path).unwrap();
}

#[test]
fn block_file_bounds() {
    let path = image("bounds");
    let file = BlockFile::create(&path, 2).unwrap();
    assert_eq!(2, file.num_blocks());

    let block = vec![0x5A; BLOCK_SIZE];
    file.write_block(1, &block).unwrap();
    let mut buf = vec![0; BLOCK_SIZE];
    file.read_block(1, &mut buf).unwrap();
    assert_eq!(block, buf);

    assert!(file.read_block(2, &mut buf).is_err());
    assert!(file.write_block(0, &block[..10]).is_err());

    drop(file);
    fs::remove_file(path).unwrap();
}

#[test]
fn make_rejects_sizes() {
    assert_eq!(Err(FsError::InvalidArgument), make(image("zero"), 0));
    assert_eq!(Err(FsError::InvalidArgument), make(image("huge"), 70000));
}

#[test]
fn session_by_name() {
    let path = image("session");
    let mut session = Session::new();
    assert_eq!(Err(FsError::NotMounted), mount(&mut session, &path));

    make(&path, 10).unwrap();
    mount(&mut session, &path).unwrap();
    assert_eq!(Err(FsError::AlreadyMounted), mount(&mut session, &path));

    let fs = session.fs_mut().unwrap();
    fs.create("a").unwrap();
    assert_eq!(9, fs.info().fat_free);
    session.unmount().unwrap();

    mount(&mut session, &path).unwrap();
    assert_eq!(1, session.fs().unwrap().ls().count());
    session.unmount().unwrap();

    fs::remove_file(path).unwrap();
}
