//! # File-Backed Paged Store
//!
//! [`PageFile`] implements [`PageStore`] over a plain [`std::fs::File`]
//! with positioned whole-page I/O. There is no caching layer here: every
//! read and write goes straight to the file, and callers own the page
//! buffers. The OS page cache does the buffering.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use super::{AccessMode, PageBuf, PageId, PageStore};
use crate::config::PAGE_SIZE;

#[derive(Debug)]
pub struct PageFile {
    file: File,
    mode: AccessMode,
    page_count: u32,
}

impl PageFile {
    /// Opens an index file. Read-write mode creates the file if it does
    /// not exist; read-only mode requires it to exist already. The file
    /// length must be a whole number of pages.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref();

        let file = match mode {
            AccessMode::ReadOnly => OpenOptions::new()
                .read(true)
                .open(path)
                .wrap_err_with(|| format!("failed to open page file '{}'", path.display()))?,
            AccessMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .wrap_err_with(|| format!("failed to create page file '{}'", path.display()))?,
        };

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to get metadata for '{}'", path.display()))?
            .len();

        ensure!(
            file_size % PAGE_SIZE as u64 == 0,
            "page file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            PAGE_SIZE
        );

        Ok(Self {
            file,
            mode,
            page_count: (file_size / PAGE_SIZE as u64) as u32,
        })
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Flushes file contents and metadata to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().wrap_err("failed to sync page file")
    }

    /// Syncs (when writable) and releases the file handle.
    pub fn close(self) -> Result<()> {
        if self.mode == AccessMode::ReadWrite {
            self.sync()?;
        }
        Ok(())
    }

    fn seek_to(&mut self, pid: PageId) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(pid as u64 * PAGE_SIZE as u64))
            .wrap_err_with(|| format!("failed to seek to page {}", pid))?;
        Ok(())
    }
}

impl PageStore for PageFile {
    fn read_page(&mut self, pid: PageId, buf: &mut PageBuf) -> Result<()> {
        ensure!(
            pid < self.page_count,
            "page {} out of bounds (page_count={})",
            pid,
            self.page_count
        );

        self.seek_to(pid)?;
        self.file
            .read_exact(buf)
            .wrap_err_with(|| format!("failed to read page {}", pid))
    }

    fn write_page(&mut self, pid: PageId, buf: &PageBuf) -> Result<()> {
        ensure!(
            self.mode == AccessMode::ReadWrite,
            "page file is open read-only"
        );
        ensure!(
            pid <= self.page_count,
            "write to page {} beyond end {} would leave a hole",
            pid,
            self.page_count
        );

        self.seek_to(pid)?;
        self.file
            .write_all(buf)
            .wrap_err_with(|| format!("failed to write page {}", pid))?;

        if pid == self.page_count {
            self.page_count += 1;
        }
        Ok(())
    }

    fn end_pid(&self) -> PageId {
        self.page_count
    }
}
