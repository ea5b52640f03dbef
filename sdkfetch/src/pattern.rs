use crate::extension::ArchiveExtension;
use anyhow::Result;
use regex::{CaptureMatches, Regex};

/// A compiled pattern that finds `browser_download_url` values ending in one archive extension
/// inside the raw text of a release metadata document.
///
/// The document is never decoded as JSON. The link is the pattern's first capture group.
#[derive(Clone, Debug)]
pub(crate) struct AssetPattern {
    extension: ArchiveExtension,
    regex: Regex,
}

impl AssetPattern {
    /// Compiles the pattern for the given extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex cannot be compiled.
    pub(crate) fn new(extension: ArchiveExtension) -> Result<Self> {
        let regex = Regex::new(&format!(
            r#""browser_download_url"\s*:\s*"([^"]*?{})""#,
            regex::escape(extension.extension()),
        ))?;
        Ok(Self { extension, regex })
    }

    /// The extension that matched links end in.
    #[must_use]
    pub(crate) fn extension(&self) -> ArchiveExtension {
        self.extension
    }

    pub(crate) fn captures_iter<'r, 'h>(&'r self, haystack: &'h str) -> CaptureMatches<'r, 'h> {
        self.regex.captures_iter(haystack)
    }
}
