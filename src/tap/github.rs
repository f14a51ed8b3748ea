//! GitHub release creation and asset upload over the REST API.

use super::{FsContext, Result, TapError};
use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Serialize)]
struct NewRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

/// The parts of GitHub's release object this tool uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub html_url: String,
    /// RFC 6570 template, e.g. `.../assets{?name,label}`
    pub upload_url: String,
}

/// `## Updates` followed by one bullet per cask change.
pub fn release_notes(updates: &[String]) -> String {
    let bullets: Vec<String> = updates.iter().map(|line| format!("* {line}")).collect();
    format!("## Updates\n{}", bullets.join("\n"))
}

/// Expands a release's `upload_url` template for one asset.
pub fn asset_upload_url(upload_url: &str, asset_name: &str) -> Result<Url> {
    let base = upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base);
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("name", asset_name);
    Ok(url)
}

/// Minimal authenticated client for the releases API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    repository: String,
}

impl GitHubClient {
    pub fn new(token: &str, repository: &str) -> Result<Self> {
        Self::with_api_base(token, repository, API_BASE)
    }

    pub fn with_api_base(token: &str, repository: &str, api_base: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TapError::MissingToken);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            TapError::GitHub {
                operation: "authenticate".to_string(),
                status: 0,
                message: "token contains characters not allowed in a header".to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        })
    }

    /// Creates a published (non-draft, non-prerelease) release for `tag`.
    pub async fn create_release(&self, tag: &str, title: &str, body: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/releases", self.api_base, self.repository);
        log::info!("Creating GitHub Release {}...", tag);

        let response = self
            .http
            .post(&url)
            .json(&NewRelease {
                tag_name: tag,
                name: title,
                body,
                draft: false,
                prerelease: false,
            })
            .send()
            .await?;

        let response = check_status(response, "create release").await?;
        Ok(response.json::<Release>().await?)
    }

    /// Uploads `path` as an asset named after its file name.
    pub async fn upload_asset(&self, release: &Release, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = asset_upload_url(&release.upload_url, &name)?;
        log::info!("Uploading {}...", name);

        let body = Bytes::from(
            tokio::fs::read(path)
                .await
                .fs_context("reading release asset", path)?,
        );

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        check_status(response, "upload asset").await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| format!("HTTP {status}"));
    Err(TapError::GitHub {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}
