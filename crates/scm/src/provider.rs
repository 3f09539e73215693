//! Repository URL classification.

use crate::error::ScmError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    // [scheme://][user@]host[:port][/path], no whitespace anywhere
    static ref REPO_URL: Regex = Regex::new(
        r"^(?:https?://)?(?:[^/@\s]+@)?([A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+)(?::\d+)?(/\S*)?$"
    )
    .expect("repository URL pattern is valid");
}

/// Hosting services we can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitProvider {
    GitHub,
    GitLab,
}

impl GitProvider {
    /// Match a bare host name (no scheme, no port) against the supported services.
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        match host.strip_prefix("www.").unwrap_or(&host) {
            "github.com" => Some(GitProvider::GitHub),
            "gitlab.com" => Some(GitProvider::GitLab),
            _ => None,
        }
    }

    /// GitLab refuses anonymous branch lookups, GitHub allows them.
    pub fn requires_token(self) -> bool {
        matches!(self, GitProvider::GitLab)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GitProvider::GitHub => "github",
            GitProvider::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for GitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider plus owner/repository path parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub provider: GitProvider,
    pub owner: String,
    pub repo: String,
}

impl RepoLocation {
    /// Parse a repository URL.
    ///
    /// Accepts forms like:
    /// - https://github.com/owner/repo
    /// - https://www.gitlab.com/owner/repo.git
    /// - github.com/owner/repo
    ///
    /// Strings that are not URL-shaped, or that carry fewer than two path
    /// segments, are [`ScmError::InvalidUrl`]. Any host other than GitHub or
    /// GitLab is [`ScmError::UnsupportedHost`].
    pub fn parse(url: &str) -> Result<Self, ScmError> {
        let url = url.trim();
        let captures = REPO_URL
            .captures(url)
            .ok_or_else(|| ScmError::InvalidUrl(url.to_string()))?;

        let host = &captures[1];
        let provider = GitProvider::from_host(host)
            .ok_or_else(|| ScmError::UnsupportedHost(host.to_string()))?;

        let path = captures.get(2).map_or("", |m| m.as_str());
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next();
        let repo = segments.next().map(|r| r.trim_end_matches(".git"));

        match (owner, repo) {
            (Some(owner), Some(repo)) if !repo.is_empty() => Ok(RepoLocation {
                provider,
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(ScmError::InvalidUrl(url.to_string())),
        }
    }

    /// `owner/repo`, the project path both services understand.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
