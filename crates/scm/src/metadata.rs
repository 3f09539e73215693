//! Remote branch metadata lookups over the hosting services' REST APIs.

use crate::error::ScmError;
use crate::provider::{GitProvider, RepoLocation};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

const USER_AGENT: &str = "console-application-operator";

/// Branch as reported by the hosting service.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    #[serde(default)]
    pub commit: Option<CommitRef>,
}

/// GitHub calls the commit id `sha`, GitLab calls it `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    #[serde(alias = "id")]
    pub sha: String,
}

/// Fetches metadata for a ref of a repository.
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Look up `reference` under the repository, authenticating with `token` when given.
    async fn get_branch(
        &self,
        location: &RepoLocation,
        reference: &str,
        token: Option<&str>,
    ) -> Result<BranchInfo, ScmError>;
}

/// [`MetadataService`] backed by the public GitHub and GitLab APIs.
#[derive(Debug, Clone)]
pub struct HttpMetadataService {
    client: reqwest::Client,
    github_api_url: String,
    gitlab_api_url: String,
}

impl HttpMetadataService {
    pub fn new(
        github_api_url: impl Into<String>,
        gitlab_api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScmError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            github_api_url: github_api_url.into().trim_end_matches('/').to_string(),
            gitlab_api_url: gitlab_api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn branch_url(&self, location: &RepoLocation, reference: &str) -> String {
        let reference = urlencoding::encode(reference);
        match location.provider {
            GitProvider::GitHub => format!(
                "{}/repos/{}/{}/branches/{}",
                self.github_api_url, location.owner, location.repo, reference
            ),
            GitProvider::GitLab => format!(
                "{}/projects/{}/repository/branches/{}",
                self.gitlab_api_url,
                urlencoding::encode(&location.full_name()),
                reference
            ),
        }
    }
}

impl Default for HttpMetadataService {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            gitlab_api_url: DEFAULT_GITLAB_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    async fn get_branch(
        &self,
        location: &RepoLocation,
        reference: &str,
        token: Option<&str>,
    ) -> Result<BranchInfo, ScmError> {
        let url = self.branch_url(location, reference);
        debug!(provider = %location.provider, %url, "Fetching branch metadata");

        let mut request = self.client.get(&url);
        request = match (location.provider, token) {
            (GitProvider::GitHub, Some(token)) => request
                .bearer_auth(token)
                .header("Accept", "application/vnd.github+json"),
            (GitProvider::GitHub, None) => request.header("Accept", "application/vnd.github+json"),
            (GitProvider::GitLab, Some(token)) => request.header("PRIVATE-TOKEN", token),
            (GitProvider::GitLab, None) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScmError::Http {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json::<BranchInfo>().await?)
    }
}
