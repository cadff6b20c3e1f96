use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use slotfs::FileType;
use slotfs::layout::constants::DEFAULT_IO_SIZE;

/// Default size of a freshly created image: 4 MiB.
pub const DEFAULT_IMAGE_LEN: u64 = 4 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "slotfs", author, version, about = "Format, inspect and populate slotfs disk images")]
pub struct Cli {
    /// Disk image to operate on.
    #[arg(long, env = "SLOTFS_IMAGE")]
    pub image: PathBuf,

    /// Device I/O unit in bytes; a logical block is two units.
    #[arg(long, env = "SLOTFS_IO_SIZE", default_value_t = DEFAULT_IO_SIZE)]
    pub io_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image file and lay out an empty filesystem on it.
    Format(FormatArgs),

    /// Print the super block and bitmap occupancy.
    Info,

    /// Create a directory.
    Mkdir(PathArgs),

    /// Create an empty node.
    Touch(TouchArgs),

    /// Store bytes in a regular file, creating it if needed.
    Write(WriteArgs),

    /// Print the contents of a regular file.
    Cat(PathArgs),

    /// Create a symbolic link holding `target`.
    Ln(LinkArgs),

    /// List a directory.
    Ls(PathArgs),

    /// Print the whole tree.
    Tree,
}

#[derive(Args)]
pub struct FormatArgs {
    #[arg(long, default_value_t = DEFAULT_IMAGE_LEN)]
    pub size: u64,

    /// Replace an existing image.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PathArgs {
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Args)]
pub struct TouchArgs {
    pub path: String,

    #[arg(long, value_enum, default_value_t = NodeKind::File)]
    pub kind: NodeKind,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,

    /// Literal contents; read from `--from` instead when given.
    #[arg(long, conflicts_with = "from")]
    pub data: Option<String>,

    #[arg(long)]
    pub from: Option<PathBuf>,
}

#[derive(Args)]
pub struct LinkArgs {
    pub path: String,

    pub target: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum NodeKind {
    File,
    Dir,
}

impl From<NodeKind> for FileType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::File => Self::Regular,
            NodeKind::Dir => Self::Directory,
        }
    }
}
