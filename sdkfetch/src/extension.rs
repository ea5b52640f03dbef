use anyhow::Result;
use itertools::Itertools;
use log::debug;
use std::path::{Path, PathBuf};
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("{} has unknown extension {ext:}", path.display())]
    UnknownExtension { path: PathBuf, ext: String },
}

/// The archive formats that `sdkfetch` knows how to unpack. The string form of each variant is the
/// extension without a leading dot, which is what the CLI accepts.
// It'd be nice to use clap::ValueEnum here, but then we'd need to add clap as a dependency for the
// library code.
#[derive(
    strum::AsRefStr,
    Clone,
    Copy,
    Debug,
    Default,
    EnumIter,
    strum::EnumString,
    PartialEq,
    Eq,
    strum::VariantNames,
)]
#[allow(clippy::module_name_repetitions)]
pub enum ArchiveExtension {
    #[strum(serialize = "tar")]
    Tar,
    #[strum(serialize = "tar.bz")]
    TarBz,
    #[strum(serialize = "tar.bz2")]
    TarBz2,
    #[strum(serialize = "tar.gz")]
    TarGz,
    #[strum(serialize = "tar.xz")]
    TarXz,
    #[strum(serialize = "tbz")]
    Tbz,
    #[strum(serialize = "tgz")]
    Tgz,
    #[strum(serialize = "txz")]
    Txz,
    #[strum(serialize = "zip")]
    #[default]
    Zip,
}

impl ArchiveExtension {
    /// The extension including its leading dot, e.g. `.tar.gz`.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveExtension::Tar => ".tar",
            ArchiveExtension::TarBz => ".tar.bz",
            ArchiveExtension::TarBz2 => ".tar.bz2",
            ArchiveExtension::TarGz => ".tar.gz",
            ArchiveExtension::TarXz => ".tar.xz",
            ArchiveExtension::Tbz => ".tbz",
            ArchiveExtension::Tgz => ".tgz",
            ArchiveExtension::Txz => ".txz",
            ArchiveExtension::Zip => ".zip",
        }
    }

    pub(crate) fn from_path(path: &Path) -> Result<Option<ArchiveExtension>> {
        let Some(ext_str_from_path) = path.extension() else {
            return Ok(None);
        };
        let path_str = path.to_string_lossy();

        // We need to try the longest extensions first so that ".tar.gz" matches before ".gz" and so
        // on for other compression formats.
        if let Some(ext) = ArchiveExtension::iter()
            .sorted_by(|a, b| Ord::cmp(&a.extension().len(), &b.extension().len()))
            .rev()
            // This is intentionally using a string comparison instead of looking at
            // path.extension(). That's because the `.extension()` method returns `"gz"` for paths
            // like "foo.tar.gz", instead of "tar.gz".
            .find(|e| path_str.ends_with(e.extension()))
        {
            debug!("{} has the {} extension", path.display(), ext.extension());
            return Ok(Some(ext));
        }

        Err(ExtensionError::UnknownExtension {
            path: path.to_path_buf(),
            ext: ext_str_from_path.to_string_lossy().to_string(),
        }
        .into())
    }
}
