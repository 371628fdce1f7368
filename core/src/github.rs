use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, RepoId};
use crate::error::{MetricsError, Result};
use crate::model::{CommitChanges, CommitRecord};
use crate::period::local_date;

const PER_PAGE: &str = "100";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("ghpulse/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub truncated: bool,
    pub tree: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

#[derive(Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
    author: Option<Account>,
}

#[derive(Deserialize)]
struct CommitDetail {
    author: Option<GitIdentity>,
}

#[derive(Deserialize)]
struct GitIdentity {
    name: Option<String>,
    date: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize)]
struct Account {
    login: String,
}

#[derive(Deserialize)]
struct CommitDiff {
    #[serde(default)]
    files: Vec<ChangedFile>,
}

#[derive(Deserialize)]
struct ChangedFile {
    filename: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Deserialize)]
struct Blob {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// Read-only client for one repository. Requests are sent one at a time.
pub struct GitHubClient {
    http: Client,
    base: Url,
    repo: RepoId,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.api_base).map_err(|e| {
            MetricsError::Config(format!("invalid API base URL '{}': {e}", config.api_base))
        })?;
        if base.cannot_be_a_base() {
            return Err(MetricsError::Config(format!(
                "invalid API base URL '{}'",
                config.api_base
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token())).map_err(|_| {
            MetricsError::Config("GITHUB_TOKEN contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(API_VERSION),
        );

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(GitHubClient {
            http,
            base,
            repo: config.repo.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
                .extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> Result<Response> {
        debug!(%url, "GET");
        let response = self.http.get(url).send()?;
        check_status(response)
    }

    /// Like `get`, but an empty repository (HTTP 409) yields `None`.
    fn get_unless_empty(&self, url: Url) -> Result<Option<Response>> {
        debug!(%url, "GET");
        let response = self.http.get(url).send()?;
        if response.status() == StatusCode::CONFLICT {
            debug!("repository is empty");
            return Ok(None);
        }
        check_status(response).map(Some)
    }

    pub fn repository(&self) -> Result<RepoInfo> {
        let response = self.get(self.endpoint(&[]))?;
        parse_body(response)
    }

    /// Full commit history of the default branch, following pagination.
    pub fn commits(&self) -> Result<Vec<CommitRecord>> {
        let mut url = self.endpoint(&["commits"]);
        url.query_pairs_mut().append_pair("per_page", PER_PAGE);

        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let Some(response) = self.get_unless_empty(url)? else {
                break;
            };
            let next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);
            let items: Vec<CommitItem> = parse_body(response)?;
            debug!(page, count = items.len(), "fetched commit page");
            records.extend(items.into_iter().filter_map(commit_record));

            match next {
                Some(link) => {
                    url = Url::parse(&link).map_err(|e| {
                        MetricsError::Decode(format!("invalid pagination link '{link}': {e}"))
                    })?;
                    page += 1;
                }
                None => break,
            }
        }
        Ok(records)
    }

    /// Recursive listing of `branch`. An empty repository has an empty tree.
    pub fn tree(&self, branch: &str) -> Result<Tree> {
        let mut url = self.endpoint(&["git", "trees", branch]);
        url.query_pairs_mut().append_pair("recursive", "1");
        let Some(response) = self.get_unless_empty(url)? else {
            return Ok(Tree::default());
        };
        let tree: Tree = parse_body(response)?;
        if tree.truncated {
            warn!(
                entries = tree.tree.len(),
                "tree listing was truncated by the API; line count covers the returned entries only"
            );
        }
        Ok(tree)
    }

    /// Paths and line counts touched by one commit.
    pub fn commit_files(&self, sha: &str) -> Result<CommitChanges> {
        let response = self.get(self.endpoint(&["commits", sha]))?;
        let diff: CommitDiff = parse_body(response)?;
        Ok(commit_changes(diff))
    }

    pub fn blob(&self, sha: &str) -> Result<Vec<u8>> {
        let response = self.get(self.endpoint(&["git", "blobs", sha]))?;
        let blob: Blob = parse_body(response)?;
        decode_blob(&blob.content, &blob.encoding)
    }
}

fn parse_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .is_some_and(|v| v.as_bytes() == b"0");
    let body = response.text().unwrap_or_default();
    Err(classify_failure(status, quota_exhausted, &body))
}

fn api_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .ok()
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

fn classify_failure(status: StatusCode, quota_exhausted: bool, body: &str) -> MetricsError {
    let message = api_message(status, body);
    let code = status.as_u16();
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (quota_exhausted || message.to_lowercase().contains("rate limit")));

    if rate_limited {
        MetricsError::Api {
            status: code,
            message: format!("rate limit exceeded, wait before retrying ({message})"),
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        MetricsError::Auth {
            status: code,
            message: format!("check that GITHUB_TOKEN is valid and can read the repository ({message})"),
        }
    } else {
        MetricsError::Api {
            status: code,
            message,
        }
    }
}

fn commit_record(item: CommitItem) -> Option<CommitRecord> {
    let identity = item.commit.author;
    let Some(date) = identity.as_ref().and_then(|i| i.date) else {
        warn!(sha = %item.sha, "commit has no author date, skipping");
        return None;
    };
    let author = item
        .author
        .map(|a| a.login)
        .or_else(|| identity.and_then(|i| i.name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Some(CommitRecord {
        sha: item.sha,
        author,
        date: local_date(date),
    })
}

fn commit_changes(diff: CommitDiff) -> CommitChanges {
    diff.files.into_iter().fold(CommitChanges::default(), |mut acc, file| {
        acc.additions += file.additions;
        acc.deletions += file.deletions;
        acc.files.push(file.filename);
        acc
    })
}

/// URL of the `rel="next"` target in a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params.split(';').any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

fn decode_blob(content: &str, encoding: &str) -> Result<Vec<u8>> {
    match encoding {
        "base64" => {
            let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            Ok(STANDARD.decode(compact)?)
        }
        "utf-8" | "utf8" => Ok(content.as_bytes().to_vec()),
        other => Err(MetricsError::Decode(format!("unsupported blob encoding '{other}'"))),
    }
}
