use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use percent_encoding::percent_decode_str;
use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client,
};
use std::{
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not parse download link `{link}`")]
    InvalidUrl {
        link: String,
        #[source]
        source: url::ParseError,
    },
    #[error("download link {0} does not end in a file name")]
    NoFileName(Url),
}

/// Streams release assets into files in a download directory.
#[derive(Debug)]
pub(crate) struct Downloader {
    download_dir: PathBuf,
}

impl Downloader {
    pub(crate) fn new(download_dir: PathBuf) -> Self {
        Self { download_dir }
    }

    /// Downloads `link` to `<download dir>/<last path segment of link>` and returns that path. Any
    /// existing file at that path is replaced.
    ///
    /// The body is written to a `.part` file next to the final path and only renamed into place
    /// once the whole body has been written. If the download fails, the `.part` file is left
    /// behind and the final path is untouched.
    pub(crate) async fn download(&self, client: &Client, link: &str) -> Result<PathBuf> {
        let url = Url::parse(link).map_err(|source| DownloadError::InvalidUrl {
            link: link.to_string(),
            source,
        })?;
        let local_path = self.local_path_for(&url)?;
        let staging_path = staging_path_for(&local_path);
        debug!(
            "downloading {url} to {} via {}",
            local_path.display(),
            staging_path.display(),
        );

        fs::create_dir_all(&self.download_dir).with_context(|| {
            format!(
                "failed to create download directory at {}",
                self.download_dir.display()
            )
        })?;

        {
            let mut staging_file = File::create(&staging_path).with_context(|| {
                format!(
                    "failed to create file at {} for downloaded asset",
                    staging_path.display()
                )
            })?;

            let mut resp = client
                .get(url.clone())
                .header(ACCEPT, HeaderValue::from_static("application/octet-stream"))
                .send()
                .await
                .with_context(|| {
                    format!("failed to execute HTTP request to download asset from {url}")
                })?;
            if !resp.status().is_success() {
                let mut msg = format!("error requesting {url}: {}", resp.status());
                if let Ok(t) = resp.text().await {
                    msg.push('\n');
                    msg.push_str(&t);
                }
                return Err(anyhow!(msg));
            }

            while let Some(c) = resp
                .chunk()
                .await
                .with_context(|| {
                    format!("failed to read chunk while downloading asset from {url}")
                })?
            {
                staging_file.write_all(c.as_ref()).with_context(|| {
                    format!("failed to write chunk to {}", staging_path.display())
                })?;
            }
            staging_file
                .flush()
                .with_context(|| format!("failed to flush {}", staging_path.display()))?;
        }

        fs::rename(&staging_path, &local_path).with_context(|| {
            format!(
                "failed to move {} to {}",
                staging_path.display(),
                local_path.display()
            )
        })?;
        info!("Downloaded {url} to {}", local_path.display());

        Ok(local_path)
    }

    pub(crate) fn local_path_for(&self, url: &Url) -> Result<PathBuf, DownloadError> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy())
            .filter(|name| is_plain_file_name(name))
            .ok_or_else(|| DownloadError::NoFileName(url.clone()))?;
        Ok(self.download_dir.join(&*name))
    }
}

/// The decoded name must not be able to step out of the download directory.
fn is_plain_file_name(name: &str) -> bool {
    !(name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']))
}

fn staging_path_for(local_path: &Path) -> PathBuf {
    let mut name = local_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    local_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case::plain("https://example.com/download/v1/sdk.zip", "sdk.zip")]
    #[case::query_is_ignored("https://example.com/download/sdk.zip?raw=true", "sdk.zip")]
    #[case::root_file("https://example.com/sdk.tar.gz", "sdk.tar.gz")]
    #[case::percent_encoded("https://example.com/dl/my%20sdk%201.0.zip", "my sdk 1.0.zip")]
    fn local_path_for(#[case] link: &str, #[case] expect: &str) -> Result<()> {
        let td = tempdir()?;
        let downloader = Downloader::new(td.path().to_path_buf());
        assert_eq!(downloader.local_path_for(&Url::parse(link)?)?, td.path().join(expect));
        Ok(())
    }

    #[rstest]
    #[case::trailing_slash("https://example.com/download/")]
    #[case::no_path("https://example.com")]
    #[case::encoded_slash("https://example.com/dl/..%2Fetc%2Fsdk.zip")]
    #[case::encoded_backslash("https://example.com/dl/..%5Csdk.zip")]
    #[case::dot_segment("https://example.com/dl/%2E")]
    fn local_path_for_without_file_name(#[case] link: &str) -> Result<()> {
        let downloader = Downloader::new(PathBuf::from("unused"));
        let err = downloader.local_path_for(&Url::parse(link)?).unwrap_err();
        assert!(matches!(err, DownloadError::NoFileName(_)), "got {err:?}");
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn download_streams_body_to_file() -> Result<()> {
        let mut server = Server::new_async().await;
        let body = b"PK\x03\x04 not really a zip file".repeat(1000);
        let m = server
            .mock("GET", "/download/v0.9.0/wsl-terminal-0.9.0.zip")
            .match_header("Accept", "application/octet-stream")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let td = tempdir()?;
        let downloader = Downloader::new(td.path().join("downloads"));
        let path = downloader
            .download(
                &Client::new(),
                &format!("{}/download/v0.9.0/wsl-terminal-0.9.0.zip", server.url()),
            )
            .await?;

        assert_eq!(path, td.path().join("downloads").join("wsl-terminal-0.9.0.zip"));
        assert_eq!(fs::read(&path)?, body);
        assert!(
            !staging_path_for(&path).exists(),
            "staging file was renamed into place"
        );

        m.assert_async().await;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn download_overwrites_existing_file() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/sdk.zip")
            .with_status(200)
            .with_body("new")
            .create_async()
            .await;

        let td = tempdir()?;
        let existing = td.path().join("sdk.zip");
        fs::write(&existing, "old content that is longer than the new content")?;

        let downloader = Downloader::new(td.path().to_path_buf());
        let path = downloader
            .download(&Client::new(), &format!("{}/sdk.zip", server.url()))
            .await?;

        assert_eq!(path, existing);
        assert_eq!(fs::read_to_string(&path)?, "new");

        m.assert_async().await;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn download_reports_http_errors() -> Result<()> {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let td = tempdir()?;
        let downloader = Downloader::new(td.path().to_path_buf());
        let err = downloader
            .download(&Client::new(), &format!("{}/missing.zip", server.url()))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"), "got {msg}");
        assert!(msg.ends_with("Not Found"), "got {msg}");
        assert!(
            !td.path().join("missing.zip").exists(),
            "nothing is written to the final path on failure"
        );

        m.assert_async().await;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn download_rejects_invalid_links() -> Result<()> {
        let td = tempdir()?;
        let downloader = Downloader::new(td.path().to_path_buf());
        let err = downloader
            .download(&Client::new(), "not a url")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<DownloadError>(),
                Some(DownloadError::InvalidUrl { .. })
            ),
            "got {err}",
        );
        Ok(())
    }

    #[test_log::test]
    fn staging_path_is_a_sibling() {
        assert_eq!(
            staging_path_for(Path::new("/tmp/sdk.zip")),
            PathBuf::from("/tmp/sdk.zip.part"),
        );
    }
}
