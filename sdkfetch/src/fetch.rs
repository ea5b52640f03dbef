use crate::{downloader::Downloader, extractor::Extractor, resolver::ReleaseResolver};
use anyhow::{anyhow, Result};
use log::{debug, info};
use reqwest::Client;
use std::path::{Path, PathBuf};

/// `SdkFetch` downloads the release archive of one project and unpacks it. Use the
/// [`SdkFetchBuilder`](crate::SdkFetchBuilder) struct to create a new `SdkFetch` instance.
#[derive(Debug)]
pub struct SdkFetch {
    owner: String,
    repo: String,
    resolver: ReleaseResolver,
    downloader: Downloader,
    extractor: Extractor,
    reqwest_client: Client,
}

impl SdkFetch {
    pub(crate) fn new(
        owner: String,
        repo: String,
        resolver: ReleaseResolver,
        downloader: Downloader,
        extractor: Extractor,
        reqwest_client: Client,
    ) -> SdkFetch {
        SdkFetch {
            owner,
            repo,
            resolver,
            downloader,
            extractor,
            reqwest_client,
        }
    }

    /// The directory the archive is unpacked into.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        self.extractor.dest()
    }

    /// Returns the download links of the latest release's assets with the configured extension, in
    /// the order the release lists them. This does not download anything.
    ///
    /// # Errors
    ///
    /// * Network errors on the request to GitHub, or a non-success response.
    /// * The release has no asset with the configured extension.
    /// * A matching asset has an empty link.
    pub async fn download_links(&self) -> Result<Vec<String>> {
        self.resolver
            .resolve(&self.reqwest_client, &self.owner, &self.repo)
            .await
    }

    /// Downloads the first matching asset of the latest release and unpacks it into the install
    /// directory, which is returned.
    ///
    /// # Errors
    ///
    /// Besides the errors from [`SdkFetch::download_links`]:
    ///
    /// * The link cannot be parsed or has no file name.
    /// * Network errors while downloading, or a non-success response.
    /// * The download or install directory cannot be written to.
    /// * The archive cannot be read, or an entry's path points outside the install directory.
    pub async fn fetch_and_extract(&self) -> Result<PathBuf> {
        let links = self.download_links().await?;
        info!("Download links: {links:?}");
        let link = links
            .first()
            .ok_or_else(|| anyhow!("no download links available"))?;
        debug!("using the first of {} download links", links.len());

        let local_path = self.downloader.download(&self.reqwest_client, link).await?;
        self.extractor.extract(&local_path)?;
        info!("Unpacked into {}", self.install_dir().display());

        Ok(self.install_dir().to_path_buf())
    }
}
