use anyhow::{anyhow, Result};
use std::sync::LazyLock;
use url::Url;

pub(crate) static PROJECT_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://github.com").unwrap());

pub(crate) static DEFAULT_API_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://api.github.com").unwrap());

/// Builds `<api base>/repos/<owner>/<repo>/releases/latest`. Any path already in the base URL is
/// kept, so an Enterprise base like `https://github.example.com/api/v3` works too.
pub(crate) fn release_info_url(mut url: Url, owner: &str, repo: &str) -> Result<Url> {
    let base = url.to_string();
    url.path_segments_mut()
        .map_err(|()| anyhow!("the API base URL {base} cannot have path segments"))?
        .pop_if_empty()
        .push("repos")
        .push(owner)
        .push(repo)
        .push("releases")
        .push("latest");

    Ok(url)
}

/// Parses `owner/repo` out of a project string, which is either `owner/repo` or a URL to any page
/// in the project on github.com.
pub(crate) fn parse_project_name(project: &str) -> Result<(String, String)> {
    let parsed = if project.starts_with("http") {
        Url::parse(project)?
    } else {
        PROJECT_BASE_URL.join(project)?
    };

    let parts = parsed.path().split('/').collect::<Vec<_>>();
    // The first part is an empty string for the leading '/' in the path.
    if parts.len() < 3 || parts[1].is_empty() || parts[2].is_empty() {
        return Err(anyhow!(
            "could not parse owner and repo name from project {project}"
        ));
    }

    Ok((parts[1].to_string(), parts[2].to_string()))
}
