use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
pub struct Cli {
    /// Image file holding the filesystem
    #[arg(long, short, default_value = "fs.img")]
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image file and format it
    Format {
        /// Image size in MiB, between 8 and 1024
        #[arg(long, short, default_value_t = 8)]
        size_mib: u64,
    },
    /// Copy every regular file of a host directory into the image
    Pack {
        #[arg(long, short)]
        source: PathBuf,
    },
    /// List files with their sizes
    Ls,
    /// Write a file's contents to stdout
    Cat { name: String },
    /// Delete a file
    Rm { name: String },
}
