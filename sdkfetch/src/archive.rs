// These traits let the extractor walk zip files and tarballs the same way. Each archive type only
// needs to say how to visit its entries in order and how to describe one entry.
use crate::extension::ArchiveExtension;
use anyhow::{anyhow, Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::{self, Read, Seek},
    path::{Path, PathBuf},
};
use xz2::read::XzDecoder;
use zip::ZipArchive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Directory,
    File,
    Other,
}

/// One entry in an archive. Reading from the entry yields its content.
pub(crate) trait ArchiveEntry: Read {
    /// The path as recorded in the archive. This has not been checked in any way.
    fn path(&self) -> Result<PathBuf>;
    fn kind(&self) -> EntryKind;
    /// The recorded Unix permission bits, if the archive has them.
    fn mode(&self) -> Result<Option<u32>>;
}

pub(crate) type EntryVisitor<'v> = dyn FnMut(&mut dyn ArchiveEntry) -> Result<()> + 'v;

pub(crate) trait ArchiveReader {
    /// Calls `visit` for each entry in archive order, stopping at the first error.
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<()>;
}

/// Opens the archive at `path`, picking the format from its file name.
pub(crate) fn open_archive(path: &Path) -> Result<Box<dyn ArchiveReader>> {
    let ext = ArchiveExtension::from_path(path)?
        .ok_or_else(|| anyhow!("{} has no archive extension", path.display()))?;
    let file = open_file(path)?;

    let reader: Box<dyn ArchiveReader> = match ext {
        ArchiveExtension::Zip => Box::new(ZipArchiveReader::new(file).with_context(|| {
            format!("failed to read {} as a zip file", path.display())
        })?),
        ArchiveExtension::Tar => Box::new(TarArchiveReader::new(file)),
        ArchiveExtension::TarBz | ArchiveExtension::TarBz2 | ArchiveExtension::Tbz => {
            Box::new(TarArchiveReader::new(BzDecoder::new(file)))
        }
        ArchiveExtension::TarGz | ArchiveExtension::Tgz => {
            Box::new(TarArchiveReader::new(GzDecoder::new(file)))
        }
        ArchiveExtension::TarXz | ArchiveExtension::Txz => {
            Box::new(TarArchiveReader::new(XzDecoder::new(file)))
        }
    };

    Ok(reader)
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file at {}", path.to_string_lossy()))
}

pub(crate) struct ZipArchiveReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipArchiveReader<R> {
    pub(crate) fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> ArchiveReader for ZipArchiveReader<R> {
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<()> {
        for i in 0..self.archive.len() {
            let file = self.archive.by_index(i)?;
            let mut entry = ZipEntry {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                mode: file.unix_mode(),
                reader: file,
            };
            visit(&mut entry)?;
        }
        Ok(())
    }
}

struct ZipEntry<F: Read> {
    name: String,
    is_dir: bool,
    mode: Option<u32>,
    reader: F,
}

impl<F: Read> Read for ZipEntry<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<F: Read> ArchiveEntry for ZipEntry<F> {
    fn path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(&self.name))
    }

    fn kind(&self) -> EntryKind {
        if self.is_dir {
            return EntryKind::Directory;
        }
        // Zips made without Unix attributes, or with only permission bits, hold plain files.
        match self.mode.map(|m| m & S_IFMT) {
            None | Some(0 | S_IFREG) => EntryKind::File,
            Some(S_IFDIR) => EntryKind::Directory,
            Some(_) => EntryKind::Other,
        }
    }

    fn mode(&self) -> Result<Option<u32>> {
        Ok(self.mode)
    }
}

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;

pub(crate) struct TarArchiveReader<R: Read> {
    archive: binstall_tar::Archive<R>,
}

impl<R: Read> TarArchiveReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            archive: binstall_tar::Archive::new(reader),
        }
    }
}

impl<R: Read> ArchiveReader for TarArchiveReader<R> {
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<()> {
        for entry in self.archive.entries()? {
            let mut entry = entry?;
            visit(&mut entry)?;
        }
        Ok(())
    }
}

impl<R: Read> ArchiveEntry for binstall_tar::Entry<'_, R> {
    fn path(&self) -> Result<PathBuf> {
        Ok(binstall_tar::Entry::path(self)?.to_path_buf())
    }

    fn kind(&self) -> EntryKind {
        let entry_type = self.header().entry_type();
        if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }

    fn mode(&self) -> Result<Option<u32>> {
        Ok(Some(self.header().mode()?))
    }
}
