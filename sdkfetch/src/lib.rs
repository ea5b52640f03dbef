//! A library for downloading the latest release archive of a GitHub project and unpacking it.
//!
//! `sdkfetch` asks the GitHub API for a project's latest release, picks the download links of the
//! release assets whose names end in the requested archive extension, downloads the first one, and
//! unpacks it into an install directory.
//!
//! This project also ships a CLI tool named `sdkfetch`.
//!
//! The main entry point for programmatic use is the [`SdkFetchBuilder`] struct. Here is an example
//! of its usage:
//!
//! ```ignore
//! use sdkfetch::SdkFetchBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetch = SdkFetchBuilder::new()
//!         .project("goreliu/wsl-terminal")
//!         .install_dir("/opt/wsl-terminal")
//!         .build()?;
//!
//!     fetch.fetch_and_extract().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## How the Download Link is Found
//!
//! The release info returned by the GitHub API is scanned for `"browser_download_url"` values
//! that end in the requested extension. The scan is a text search, not a JSON parse, so any field
//! of that name anywhere in the response counts. Matches are kept in the order they appear in the
//! response, and [`SdkFetch::fetch_and_extract`] uses the first one.
//!
//! Older versions of this tool always skipped the first match. That is available with
//! [`SdkFetchBuilder::skip_first_match`].
//!
//! ## Unpacking
//!
//! Zip files and tarballs are supported. The supported extensions are:
//!
//! - `.tar`
//! - `.tar.bz`
//! - `.tar.bz2`
//! - `.tar.gz`
//! - `.tar.xz`
//! - `.tbz`
//! - `.tgz`
//! - `.txz`
//! - `.zip`
//!
//! Every entry is written under the install directory. An entry whose path is absolute or contains
//! `..` stops the extraction with an [`ExtractError::UnsafePath`] error. Existing files are
//! overwritten. On Unix, the permission bits recorded in the archive are applied.
//!
//! ## Features
//!
//! This crate offers several features to control the TLS dependency used by `reqwest`:
//!
#![doc = document_features::document_features!()]

mod archive;
mod builder;
mod downloader;
mod extension;
mod extractor;
mod fetch;
mod github;
mod pattern;
mod resolver;

pub use crate::{
    builder::SdkFetchBuilder,
    downloader::DownloadError,
    extension::{ArchiveExtension, ExtensionError},
    extractor::ExtractError,
    fetch::SdkFetch,
    resolver::ResolveError,
};

// The version of the `sdkfetch` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
use fern::{
    colors::{Color, ColoredLevelConfig},
    Dispatch,
};

/// This function initializes logging for the application. It's public for the sake of the
/// `sdkfetch` binary, but it lives in the library crate so that test code can also enable logging.
///
/// # Errors
///
/// This can return a `log::SetLoggerError` error.
#[cfg(feature = "logging")]
pub fn init_logger(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let line_colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightBlack)
        .debug(Color::BrightBlack)
        .trace(Color::BrightBlack);
    let level_colors = line_colors.info(Color::Green).debug(Color::Black);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color_line}[{target}][{level}{color_line}] {message}\x1B[0m",
                color_line = format_args!(
                    "\x1B[{}m",
                    line_colors.get_color(&record.level()).to_fg_str()
                ),
                target = record.target(),
                level = level_colors.color(record.level()),
                message = message,
            ));
        })
        .level(level)
        // These are very noisy.
        .level_for("hyper", log::LevelFilter::Error)
        .level_for("hyper_util", log::LevelFilter::Error)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
}
