//! Thin translation from kernel FUSE callbacks ([`fuser::Filesystem`]) to
//! the async filesystem core. Owns the inode <-> path table the kernel
//! needs (the core itself is entirely path-addressed) and a Tokio runtime
//! handle used to block on the core's async calls from these sync
//! callbacks.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use fuser::{
    FileAttr, FileType, Filesystem as FuseFilesystem, KernelConfig, ReplyAttr, ReplyCreate,
    ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite,
    ReplyXattr, Request, TimeOrNow,
};

use crate::backend::{Attr, Backend};
use crate::error::Error;
use crate::fs::{Filesystem as CoreFs, S_IFDIR, S_IFLNK, S_IFMT};
use crate::path;

const ROOT_INO: u64 = 1;
const ATTR_TTL: Duration = Duration::from_secs(1);

fn to_errno(err: Error) -> c_int {
    match err {
        Error::NotFound => libc::ENOENT,
        Error::AlreadyExists => libc::EEXIST,
        Error::NotADirectory => libc::ENOTDIR,
        Error::NotEmpty => libc::ENOTEMPTY,
        Error::NotSupported => libc::ENOTSUP,
        Error::IO => libc::EIO,
    }
}

fn file_type(mode: u32) -> FileType {
    match mode & S_IFMT {
        S_IFDIR => FileType::Directory,
        S_IFLNK => FileType::Symlink,
        _ => FileType::RegularFile,
    }
}

fn to_file_attr(ino: u64, attr: &Attr) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size.max(0) as u64,
        blocks: (attr.size.max(0) as u64).div_ceil(512),
        atime: attr.mtime,
        mtime: attr.mtime,
        ctime: attr.mtime,
        crtime: attr.mtime,
        kind: file_type(attr.mode),
        perm: (attr.mode & 0o7777) as u16,
        nlink: 1,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

/// Maps kernel inode numbers to the observed paths the filesystem core
/// understands. Inodes are assigned lazily on first lookup; they are
/// never reclaimed (fine for a long-lived mount; a restart starts fresh).
struct InodeTable {
    paths: DashMap<u64, String>,
    inos: DashMap<String, u64>,
    next: AtomicU64,
}

impl InodeTable {
    fn new() -> Self {
        let paths = DashMap::new();
        let inos = DashMap::new();
        paths.insert(ROOT_INO, "/".to_string());
        inos.insert("/".to_string(), ROOT_INO);
        Self { paths, inos, next: AtomicU64::new(ROOT_INO + 1) }
    }

    fn path_for(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).map(|p| p.clone())
    }

    fn ino_for(&self, path: &str) -> u64 {
        if let Some(ino) = self.inos.get(path) {
            return *ino;
        }
        let ino = self.next.fetch_add(1, Ordering::SeqCst);
        self.inos.insert(path.to_string(), ino);
        self.paths.insert(ino, path.to_string());
        ino
    }

    fn forget(&self, path: &str) {
        if let Some((_, ino)) = self.inos.remove(path) {
            self.paths.remove(&ino);
        }
    }
}

/// The `fuser::Filesystem` binding. Generic over the backend so the same
/// adapter serves the S3 backend in production and the in-memory backend
/// in `demofs`.
pub struct FuseAdapter<B: Backend> {
    core: Arc<CoreFs<B>>,
    runtime: tokio::runtime::Handle,
    inodes: InodeTable,
}

impl<B: Backend> FuseAdapter<B> {
    pub fn new(core: Arc<CoreFs<B>>, runtime: tokio::runtime::Handle) -> Self {
        Self { core, runtime, inodes: InodeTable::new() }
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.inodes.path_for(parent)?;
        let name = name.to_str()?;
        Some(path::join(parent_path.trim_end_matches('/'), name))
    }
}

impl<B: Backend + 'static> FuseFilesystem for FuseAdapter<B> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        Ok(())
    }

    fn destroy(&mut self) {
        self.runtime.block_on(self.core.shutdown());
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let ino = self.inodes.ino_for(&child);
        match self.runtime.block_on(self.core.get_attr(&child)) {
            Ok(attr) => reply.entry(&ATTR_TTL, &to_file_attr(ino, &attr), 0),
            Err(e) => {
                self.inodes.forget(&child);
                reply.error(to_errno(e));
            }
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.get_attr(&p)) {
            Ok(attr) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &attr)),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        let result = self.runtime.block_on(async {
            if let Some(mode) = mode {
                self.core.chmod(&p, mode).await?;
            }
            if uid.is_some() || gid.is_some() {
                self.core.chown(&p, uid, gid).await?;
            }
            if let Some(size) = size {
                let current = self.core.get_attr(&p).await?;
                if (size as i64) < current.size {
                    let data = self.core.read_file(&p, 0, size).await?;
                    self.core.write_file(&p, &data, 0).await?;
                } else if (size as i64) > current.size {
                    let pad = vec![0u8; (size as i64 - current.size) as usize];
                    self.core.write_file(&p, &pad, current.size as u64).await?;
                }
            }
            if atime.is_some() || mtime.is_some() {
                let now = SystemTime::now();
                let resolve = |t: Option<TimeOrNow>| match t {
                    Some(TimeOrNow::SpecificTime(t)) => t,
                    _ => now,
                };
                self.core.utimens(&p, resolve(atime), resolve(mtime)).await?;
            }
            self.core.get_attr(&p).await
        });

        match result {
            Ok(attr) => reply.attr(&ATTR_TTL, &to_file_attr(ino, &attr)),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: fuser::ReplyData) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.readlink(&p)) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn mkdir(&mut self, _req: &Request, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.mkdir(&child, mode)) {
            Ok(()) => {
                let ino = self.inodes.ino_for(&child);
                match self.runtime.block_on(self.core.get_attr(&child)) {
                    Ok(attr) => reply.entry(&ATTR_TTL, &to_file_attr(ino, &attr), 0),
                    Err(e) => reply.error(to_errno(e)),
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.rmdir(&child)) {
            Ok(()) => {
                self.inodes.forget(&child);
                reply.ok();
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.remove(&child)) {
            Ok(()) => {
                self.inodes.forget(&child);
                reply.ok();
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.create(&child, mode)) {
            Ok(()) => {
                let ino = self.inodes.ino_for(&child);
                match self.runtime.block_on(self.core.get_attr(&child)) {
                    Ok(attr) => reply.created(&ATTR_TTL, &to_file_attr(ino, &attr), 0, 0, 0),
                    Err(e) => reply.error(to_errno(e)),
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        target: &std::path::Path,
        reply: ReplyEntry,
    ) {
        let Some(child) = self.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let target = target.to_string_lossy().to_string();
        match self.runtime.block_on(self.core.symlink(&target, &child)) {
            Ok(()) => {
                let ino = self.inodes.ino_for(&child);
                match self.runtime.block_on(self.core.get_attr(&child)) {
                    Ok(attr) => reply.entry(&ATTR_TTL, &to_file_attr(ino, &attr), 0),
                    Err(e) => reply.error(to_errno(e)),
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request,
        _ino: u64,
        _newparent: u64,
        _newname: &OsStr,
        reply: ReplyEntry,
    ) {
        reply.error(to_errno(Error::NotSupported));
    }

    fn mknod(
        &mut self,
        _req: &Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        reply.error(to_errno(Error::NotSupported));
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(old), Some(new)) =
            (self.child_path(parent, name), self.child_path(newparent, newname))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.rename(&old, &new)) {
            Ok(()) => {
                self.inodes.forget(&old);
                reply.ok();
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.read_file(&p, offset.max(0) as u64, size as u64)) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.write_file(&p, data, offset.max(0) as u64)) {
            Ok(_) => reply.written(data.len() as u32),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn flush(&mut self, _req: &Request, ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.flush(&p)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn fsync(&mut self, _req: &Request, ino: u64, _fh: u64, datasync: bool, reply: ReplyEmpty) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.fsync(&p, datasync)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.release(&p)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.opendir(&p)) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.runtime.block_on(self.core.read_dir(&p)) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };

        let mut all = vec![(".".to_string(), FileType::Directory), ("..".to_string(), FileType::Directory)];
        for entry in entries {
            let kind = if entry.is_dir { FileType::Directory } else { FileType::RegularFile };
            all.push((entry.name, kind));
        }

        for (i, (name, kind)) in all.into_iter().enumerate().skip(offset as usize) {
            let child_path = if name == "." || name == ".." {
                p.clone()
            } else {
                path::join(p.trim_end_matches('/'), &name)
            };
            let child_ino = self.inodes.ino_for(&child_path);
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        let s = self.core.statfs();
        reply.statfs(s.blocks, s.blocks_free, s.blocks_free, s.inodes, s.inodes_free, s.block_size, s.name_max, s.block_size);
    }

    fn access(&mut self, _req: &Request, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.access(&p)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn getxattr(&mut self, _req: &Request, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.runtime.block_on(self.core.get_xattr(&p, name)) {
            Ok(value) => {
                if size == 0 {
                    reply.size(value.len() as u32);
                } else if value.len() > size as usize {
                    reply.error(libc::ERANGE);
                } else {
                    reply.data(&value);
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.runtime.block_on(self.core.set_xattr(&p, name, value)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn removexattr(&mut self, _req: &Request, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.runtime.block_on(self.core.remove_xattr(&p, name)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn listxattr(&mut self, _req: &Request, ino: u64, size: u32, reply: ReplyXattr) {
        let Some(p) = self.inodes.path_for(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.runtime.block_on(self.core.list_xattr(&p)) {
            Ok(names) => {
                let mut buf = Vec::new();
                for name in names {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                }
                if size == 0 {
                    reply.size(buf.len() as u32);
                } else if buf.len() > size as usize {
                    reply.error(libc::ERANGE);
                } else {
                    reply.data(&buf);
                }
            }
            Err(e) => reply.error(to_errno(e)),
        }
    }
}
