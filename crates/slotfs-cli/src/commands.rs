use std::fs;

use anyhow::{Context, Result, bail};
use slotfs::device::ImageDevice;
use slotfs::path::{components, file_name};
use slotfs::{EntryId, FileSystem, FileType, FsError, FsResult, Ino, MountOptions};
use tracing::info;

use crate::cli::{Cli, Command, FormatArgs, LinkArgs, TouchArgs, WriteArgs};

/// Runs one subcommand and returns the lines it prints.
pub fn run(cli: &Cli) -> Result<Vec<String>> {
    match &cli.command {
        Command::Format(args) => format(cli, args),
        Command::Info => with_fs(cli, |fs| Ok(info_lines(fs))),
        Command::Mkdir(args) => {
            let (parent, name) = split(&args.path)?;
            with_fs(cli, |fs| fs.create_node(&parent, &name, FileType::Directory))?;
            Ok(Vec::new())
        }
        Command::Touch(TouchArgs { path, kind }) => {
            let (parent, name) = split(path)?;
            with_fs(cli, |fs| fs.create_node(&parent, &name, (*kind).into()))?;
            Ok(Vec::new())
        }
        Command::Write(args) => write(cli, args),
        Command::Cat(args) => {
            let bytes = with_fs(cli, |fs| {
                let ino = resolve(fs, &args.path)?;
                let size = fs.record(ino).map_or(0, |r| r.size as usize);
                let data = fs.file_data(ino)?;
                Ok(data[..size.min(data.len())].to_vec())
            })?;
            Ok(String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect())
        }
        Command::Ln(LinkArgs { path, target }) => {
            let (parent, name) = split(path)?;
            with_fs(cli, |fs| {
                let ino = fs.create_node(&parent, &name, FileType::Symlink)?;
                fs.set_link_target(ino, target)
            })?;
            Ok(Vec::new())
        }
        Command::Ls(args) => with_fs(cli, |fs| {
            let entries = fs.read_dir(&args.path)?;
            for &id in &entries {
                fs.ensure_loaded(id)?;
            }
            Ok(entries.into_iter().map(|id| describe(fs, id)).collect())
        }),
        Command::Tree => with_fs(cli, |fs| {
            let mut out = vec!["/".to_string()];
            walk(fs, fs.root(), 1, &mut out)?;
            Ok(out)
        }),
    }
}

fn format(cli: &Cli, args: &FormatArgs) -> Result<Vec<String>> {
    if cli.image.exists() {
        if !args.force {
            bail!("{} already exists, pass --force to replace it", cli.image.display());
        }
        fs::remove_file(&cli.image)
            .with_context(|| format!("failed to remove {}", cli.image.display()))?;
    }
    let dev = ImageDevice::create(&cli.image, args.size, cli.io_size)?;
    let mut fs = FileSystem::mount_device(Box::new(dev))?;
    let lines = info_lines(&fs);
    fs.unmount()?;
    info!(image = %cli.image.display(), size = args.size, "formatted");
    Ok(lines)
}

fn write(cli: &Cli, args: &WriteArgs) -> Result<Vec<String>> {
    let payload = match (&args.data, &args.from) {
        (_, Some(src)) => fs::read(src).with_context(|| format!("failed to read {}", src.display()))?,
        (Some(data), None) => data.clone().into_bytes(),
        (None, None) => bail!("nothing to write, pass --data or --from"),
    };
    let (parent, name) = split(&args.path)?;
    with_fs(cli, |fs| {
        let hit = fs.lookup(&args.path)?;
        let ino = if hit.found {
            fs.ensure_loaded(hit.entry)?
        } else {
            fs.create_node(&parent, &name, FileType::Regular)?
        };
        let size = u32::try_from(payload.len()).map_err(|_| FsError::NoSpace)?;
        fs.set_size(ino, size)?;
        let buf = fs.file_data_mut(ino)?;
        buf[..payload.len()].copy_from_slice(&payload);
        buf[payload.len()..].fill(0);
        Ok(())
    })?;
    Ok(Vec::new())
}

/// Mounts the image, runs `f` and unmounts, reporting the first failure.
fn with_fs<T>(cli: &Cli, f: impl FnOnce(&mut FileSystem) -> FsResult<T>) -> Result<T> {
    let opts = MountOptions::new(&cli.image).with_io_size(cli.io_size);
    let mut fs = FileSystem::mount(&opts)?;
    let out = f(&mut fs);
    let unmounted = fs.unmount();
    let out = out?;
    unmounted?;
    Ok(out)
}

fn resolve(fs: &mut FileSystem, path: &str) -> FsResult<Ino> {
    let hit = fs.lookup(path)?;
    if !hit.found {
        return Err(FsError::NotFound(path.to_string()));
    }
    fs.ensure_loaded(hit.entry)
}

/// Splits `path` into its parent directory and final name.
pub fn split(path: &str) -> Result<(String, String)> {
    let name = file_name(path).context("path names the root directory")?;
    let parts: Vec<&str> = components(path).collect();
    let parent = format!("/{}", parts[..parts.len() - 1].join("/"));
    Ok((parent, name.to_string()))
}

fn info_lines(fs: &FileSystem) -> Vec<String> {
    let sb = fs.super_block();
    vec![
        format!("device size   {}", sb.device_size),
        format!("io size       {}", sb.io_size),
        format!("block size    {}", sb.block_size),
        format!("objects       {}/{}", fs.inode_map().count_set(), sb.max_ino),
        format!("data units    {}/{}", fs.data_map().count_set(), sb.max_data),
        format!("usage blocks  {}", sb.usage),
        format!("index map at  {}", sb.inode_map_offset),
        format!("data map at   {}", sb.data_map_offset),
        format!("index region  {}", sb.inode_offset),
    ]
}

fn describe(fs: &FileSystem, id: EntryId) -> String {
    let entry = fs.entry(id);
    let tag = match entry.kind {
        FileType::Directory => 'd',
        FileType::Regular => '-',
        FileType::Symlink => 'l',
    };
    let ino = entry.ino.map_or_else(|| "?".to_string(), |i| i.to_string());
    let record = entry.record.and_then(|i| fs.record(i));
    let size = record.map_or(0, |r| r.size);
    match record {
        Some(r) if entry.kind == FileType::Symlink => {
            format!("{tag} {ino:>5} {size:>6} {} -> {}", entry.name, r.link_target)
        }
        _ => format!("{tag} {ino:>5} {size:>6} {}", entry.name),
    }
}

fn walk(fs: &mut FileSystem, dir: EntryId, depth: usize, out: &mut Vec<String>) -> FsResult<()> {
    let ino = fs.ensure_loaded(dir)?;
    let children: Vec<EntryId> = fs.tree().children(ino).collect();
    for child in children {
        fs.ensure_loaded(child)?;
        out.push(format!("{}{}", "  ".repeat(depth), describe(fs, child)));
        if fs.entry(child).kind.is_dir() {
            walk(fs, child, depth + 1, out)?;
        }
    }
    Ok(())
}
