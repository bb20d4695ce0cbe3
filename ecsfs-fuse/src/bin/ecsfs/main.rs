mod cli;

use std::fs;
use std::io::{self, Write};

use clap::Parser;
use cli::{Cli, Command};
use ecsfs::{BLOCK_SIZE, FileSystem, FsError};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Make { disk, data_blocks } => {
            ecsfs_fuse::make(&disk, data_blocks).map_err(io::Error::other)?;
            println!("Created {disk:?} with {data_blocks} data blocks");
        }
        Command::Info { disk } => {
            let fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            print!("{}", fs.info());
        }
        Command::Ls { disk } => {
            let fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            print!("{}", fs.ls());
        }
        Command::Add {
            disk,
            host_file,
            name,
        } => {
            let data = fs::read(&host_file)?;
            let name = match name {
                Some(name) => name,
                None => host_file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| io::Error::other("host file has no usable name"))?
                    .to_owned(),
            };

            let mut fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            let wrote = add(&mut fs, &name, &data).map_err(io::Error::other)?;
            unmount(fs)?;
            println!("Wrote {wrote} of {} bytes to {name:?}", data.len());
        }
        Command::Rm { disk, name } => {
            let mut fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            fs.delete(&name).map_err(io::Error::other)?;
            unmount(fs)?;
            println!("Removed {name:?}");
        }
        Command::Cat { disk, name } => {
            let mut fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            let fd = fs.open(&name).map_err(io::Error::other)?;
            let mut stdout = io::stdout().lock();
            let mut buf = vec![0; BLOCK_SIZE];
            loop {
                let read = fs.read(fd, &mut buf).map_err(io::Error::other)?;
                if read == 0 {
                    break;
                }
                stdout.write_all(&buf[..read])?;
            }
            stdout.flush()?;
        }
        Command::Stat { disk, name } => {
            let mut fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            let fd = fs.open(&name).map_err(io::Error::other)?;
            let size = fs.stat(fd).map_err(io::Error::other)?;
            println!("Size of file {name:?} is {size} bytes");
        }
        Command::Check { disk } => {
            let fs = ecsfs_fuse::open(&disk).map_err(io::Error::other)?;
            fs.check().map_err(io::Error::other)?;
            println!("{disk:?}: {} files, all chains intact", fs.ls().count());
        }
    }

    Ok(())
}

/// 新建文件并写入全部内容，空间不足时只写入一部分
fn add(fs: &mut FileSystem, name: &str, data: &[u8]) -> Result<usize, FsError> {
    fs.create(name)?;
    let fd = fs.open(name)?;
    let wrote = fs.write(fd, data)?;
    fs.close(fd)?;
    if wrote < data.len() {
        log::warn!("disk full, {name:?} truncated to {wrote} bytes");
    }
    Ok(wrote)
}

fn unmount(fs: FileSystem) -> io::Result<()> {
    fs.unmount()
        .map(drop)
        .map_err(|(_, e)| io::Error::other(e))
}
