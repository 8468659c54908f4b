//! Change-set retrieval from the GitHub REST API.
//!
//! `GET /repos/{owner}/{repo}/commits/{ref}` lists the files touched by the
//! commit `ref` points at. The `files` array is paginated; pages are fetched
//! until a short page comes back.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use cosync_core::ChangeRecord;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
// GitHub stops listing files after 3000 entries.
const MAX_PAGES: u32 = 30;

/// One entry of a commit's `files` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub previous_filename: Option<String>,
}

impl From<CommitFile> for ChangeRecord {
    fn from(file: CommitFile) -> Self {
        ChangeRecord::from_status(file.filename, &file.status, file.previous_filename)
    }
}

/// The subset of the commit response cosync reads.
#[derive(Debug, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub sha: Option<String>,
    pub files: Option<Vec<CommitFile>>,
}

impl CommitResponse {
    /// The changed files; a response without a `files` list is an upstream error.
    pub fn into_files(self) -> Result<Vec<CommitFile>> {
        let sha = self.sha.unwrap_or_else(|| "<unknown>".into());
        self.files
            .ok_or_else(|| anyhow!("commit {sha} response has no files list"))
    }
}

/// Blocking GitHub REST client.
pub struct GithubClient {
    agent: ureq::Agent,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Client for `api_url`; an empty `token` sends unauthenticated requests.
    pub fn new(api_url: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            api_url: api_url.trim_end_matches('/').to_owned(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Files changed by the commit `reference` resolves to in `repository`
    /// (`owner/name`).
    pub fn commit_changes(&self, repository: &str, reference: &str) -> Result<Vec<ChangeRecord>> {
        if !repository.contains('/') {
            bail!("repository must be 'owner/name', got '{repository}'");
        }

        let url = format!("{}/repos/{}/commits/{}", self.api_url, repository, reference);
        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let files = self
                .fetch_page(&url, page)
                .with_context(|| {
                    format!("failed to list changes of '{reference}' in {repository}")
                })?;
            let count = files.len();
            records.extend(files.into_iter().map(ChangeRecord::from));
            tracing::debug!(page, count, "fetched commit files");
            if count < PER_PAGE {
                break;
            }
        }

        Ok(records)
    }

    fn fetch_page(&self, url: &str, page: u32) -> Result<Vec<CommitFile>> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
            .set("User-Agent", concat!("cosync/", env!("CARGO_PKG_VERSION")))
            .query("per_page", &PER_PAGE.to_string())
            .query("page", &page.to_string());
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("GitHub API returned {code}: {body}");
            }
            Err(err) => return Err(err).context("GitHub API request failed"),
        };

        let body: CommitResponse = response
            .into_json()
            .context("GitHub API returned an unreadable commit response")?;
        body.into_files()
    }
}
