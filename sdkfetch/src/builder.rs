/// The `builder` module contains the `SdkFetchBuilder` struct which is used to create a `SdkFetch`
/// instance.
use crate::{
    downloader::Downloader, extension::ArchiveExtension, extractor::Extractor, fetch::SdkFetch,
    github, pattern::AssetPattern, resolver::ReleaseResolver,
};
use anyhow::{anyhow, Result};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use std::{
    env,
    path::{Path, PathBuf},
};
use url::Url;

/// `SdkFetchBuilder` is used to create a [`SdkFetch`] instance.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SdkFetchBuilder<'a> {
    project: Option<&'a str>,
    extension: Option<ArchiveExtension>,
    install_dir: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    api_base_url: Option<&'a str>,
    skip_first_match: bool,
}

impl<'a> SdkFetchBuilder<'a> {
    /// Returns a new empty `SdkFetchBuilder`.
    #[must_use]
    pub fn new() -> Self {
        SdkFetchBuilder::default()
    }

    /// Set the project to download from. This can either be just the owner/name, like
    /// `goreliu/wsl-terminal`, or a URL to any page of the project on GitHub, like
    /// `https://github.com/goreliu/wsl-terminal/releases`.
    ///
    /// You must set this.
    #[must_use]
    pub fn project(mut self, project: &'a str) -> Self {
        self.project = Some(project);
        self
    }

    /// Set the archive extension that release assets must have. Defaults to
    /// [`ArchiveExtension::Zip`].
    #[must_use]
    pub fn extension(mut self, extension: ArchiveExtension) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Set the directory to unpack the archive into. It is created if it does not exist. If not
    /// set, it will default to `sdk` in the user's home directory.
    #[must_use]
    pub fn install_dir<P: AsRef<Path>>(mut self, install_dir: P) -> Self {
        self.install_dir = Some(install_dir.as_ref().to_path_buf());
        self
    }

    /// Set the directory the archive is downloaded into. If not set, it will default to the OS
    /// temporary directory.
    #[must_use]
    pub fn download_dir<P: AsRef<Path>>(mut self, download_dir: P) -> Self {
        self.download_dir = Some(download_dir.as_ref().to_path_buf());
        self
    }

    /// Set the base URL for the GitHub API. This is useful for testing or if you want to operate
    /// against an Enterprise version of GitHub. This should be something like
    /// `https://github.my-corp.example.com/api/v3`.
    #[must_use]
    pub fn api_base_url(mut self, api_base_url: &'a str) -> Self {
        self.api_base_url = Some(api_base_url);
        self
    }

    /// Call this to ignore the first matching asset in the release info, which is what older
    /// versions of this tool did. Only use this if you depend on that exact behavior.
    #[must_use]
    pub fn skip_first_match(mut self) -> Self {
        self.skip_first_match = true;
        self
    }

    /// Builds a new [`SdkFetch`] instance and returns it.
    ///
    /// # Errors
    ///
    /// If you have not set a `project`, the project cannot be parsed, the API base URL is not a
    /// valid URL, or no install directory was set and the home directory cannot be determined,
    /// then this method will return an error.
    pub fn build(self) -> Result<SdkFetch> {
        let Some(project) = self.project else {
            return Err(anyhow!("You must set a project"));
        };
        let (owner, repo) = github::parse_project_name(project)?;
        debug!("Parsed project {project} = {owner} / {repo}");

        let api_base_url = match self.api_base_url {
            Some(u) => Url::parse(u)?,
            None => github::DEFAULT_API_BASE_URL.clone(),
        };
        let extension = self.extension.unwrap_or_default();
        let resolver = ReleaseResolver::new(
            api_base_url,
            AssetPattern::new(extension)?,
            self.skip_first_match,
        );

        let download_dir = self.download_dir.unwrap_or_else(env::temp_dir);
        debug!("download dir = {}", download_dir.display());
        let install_dir = match self.install_dir {
            Some(d) => d,
            None => default_install_dir()?,
        };
        debug!("install dir = {}", install_dir.display());

        Ok(SdkFetch::new(
            owner,
            repo,
            resolver,
            Downloader::new(download_dir),
            Extractor::new(install_dir),
            reqwest_client()?,
        ))
    }
}

/// `<home>/sdk`, where home is `$HOME`, or `%USERPROFILE%` if `HOME` is not set.
fn default_install_dir() -> Result<PathBuf> {
    let home = env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .or_else(|| env::var_os("USERPROFILE").filter(|h| !h.is_empty()))
        .ok_or_else(|| {
            anyhow!("could not determine your home directory, so you must set an install dir")
        })?;
    let mut install_dir = PathBuf::from(home);
    install_dir.push("sdk");
    Ok(install_dir)
}

fn reqwest_client() -> Result<Client> {
    let builder = Client::builder().gzip(true);

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("sdkfetch version {}", super::VERSION))?,
    );
    Ok(builder.default_headers(headers).build()?)
}
