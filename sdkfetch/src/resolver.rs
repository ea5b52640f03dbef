use crate::{github, pattern::AssetPattern};
use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client,
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("the {0} part of the project name cannot be empty")]
    EmptyIdentifier(&'static str),
    #[error("no match for a download url ending in {extension} in the release info at {url}")]
    NoMatch { url: Url, extension: &'static str },
    #[error("a download url match in the release info at {url} has no link in it")]
    MissingCapture { url: Url },
    #[error("empty download link in the release info at {url}")]
    EmptyLink { url: Url },
}

/// Finds the download links for the assets of a project's latest release.
#[derive(Debug)]
pub(crate) struct ReleaseResolver {
    api_base_url: Url,
    pattern: AssetPattern,
    skip_first_match: bool,
}

impl ReleaseResolver {
    pub(crate) fn new(api_base_url: Url, pattern: AssetPattern, skip_first_match: bool) -> Self {
        Self {
            api_base_url,
            pattern,
            skip_first_match,
        }
    }

    /// Returns every matching asset link in the order they appear in the release info. The
    /// returned list is never empty.
    pub(crate) async fn resolve(
        &self,
        client: &Client,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<String>> {
        if owner.is_empty() {
            return Err(ResolveError::EmptyIdentifier("owner").into());
        }
        if repo.is_empty() {
            return Err(ResolveError::EmptyIdentifier("repo").into());
        }

        let url = github::release_info_url(self.api_base_url.clone(), owner, repo)?;
        info!("Getting release info from {url}");

        let resp = client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .with_context(|| format!("failed to get release info at {url}"))?;
        if let Err(e) = resp.error_for_status_ref() {
            return Err(
                anyhow::Error::new(e).context(format!("failed to get release info at {url}"))
            );
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read release info from {url}"))?;
        debug!("release info at {url} is {} bytes", body.len());

        Ok(self.links_from_release_info(&body, &url)?)
    }

    /// Applies the asset pattern to a release info body. `source` is only used for error messages.
    pub(crate) fn links_from_release_info(
        &self,
        body: &str,
        source: &Url,
    ) -> Result<Vec<String>, ResolveError> {
        let no_match = || ResolveError::NoMatch {
            url: source.clone(),
            extension: self.pattern.extension().extension(),
        };

        let matches = self.pattern.captures_iter(body).collect::<Vec<_>>();
        if matches.is_empty() {
            return Err(no_match());
        }

        let skip = if self.skip_first_match {
            debug!("skipping the first of {} download url matches", matches.len());
            1
        } else {
            0
        };

        let mut links = Vec::with_capacity(matches.len());
        // The pattern always captures a non-empty link, so neither error below is reachable today.
        for caps in matches.iter().skip(skip) {
            let Some(link) = caps.get(1) else {
                return Err(ResolveError::MissingCapture {
                    url: source.clone(),
                });
            };
            if link.as_str().is_empty() {
                return Err(ResolveError::EmptyLink {
                    url: source.clone(),
                });
            }
            links.push(link.as_str().to_string());
        }

        if links.is_empty() {
            return Err(no_match());
        }

        Ok(links)
    }
}
