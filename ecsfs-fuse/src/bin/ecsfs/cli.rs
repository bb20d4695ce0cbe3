use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about = "Inspect and edit ECS150FS disk images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new empty image
    Make {
        disk: PathBuf,
        /// Number of data blocks
        data_blocks: usize,
    },
    /// Print the superblock and free space
    Info { disk: PathBuf },
    /// List files in the root directory
    Ls { disk: PathBuf },
    /// Copy a host file into the image
    Add {
        disk: PathBuf,
        host_file: PathBuf,
        /// Name inside the image, defaults to the host file name
        #[arg(long, short)]
        name: Option<String>,
    },
    /// Delete a file
    Rm { disk: PathBuf, name: String },
    /// Write a file's content to stdout
    Cat { disk: PathBuf, name: String },
    /// Print a file's size
    Stat { disk: PathBuf, name: String },
    /// Verify every allocation chain
    Check { disk: PathBuf },
}
