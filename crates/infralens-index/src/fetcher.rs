//! Repository fetching: visibility probe against the hosting API and a full
//! `git clone` into a scratch directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::process::Command;
use url::Url;

use crate::error::{CloneError, IndexError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_CLONE_BASE: &str = "https://github.com";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `owner/name` of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    #[must_use]
    pub fn is_private(self) -> bool {
        self == Self::Private
    }
}

/// Parse `https://github.com/{owner}/{name}`, with or without a `.git`
/// suffix or trailing slash.
///
/// # Errors
///
/// Returns [`IndexError::InvalidUrl`] for anything else.
pub fn parse_repo_url(repo_url: &str) -> Result<RepoSlug> {
    let invalid = || IndexError::InvalidUrl(repo_url.to_owned());
    let url = Url::parse(repo_url.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "https" | "http")
        || !matches!(url.host_str(), Some("github.com" | "www.github.com"))
    {
        return Err(invalid());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty())
        .collect();
    let [owner, name] = segments.as_slice() else {
        return Err(invalid());
    };
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        return Err(invalid());
    }
    Ok(RepoSlug {
        owner: (*owner).to_owned(),
        name: name.to_owned(),
    })
}

/// Source of repository working trees.
pub trait Fetcher: Send + Sync {
    /// Probe repository visibility. Never fails: a missing repository is
    /// reported private, any other problem public.
    fn check_visibility<'a>(
        &'a self,
        repo_url: &'a str,
        credential: Option<&'a str>,
    ) -> BoxFuture<'a, Visibility>;

    /// Clone `repo_url` into `destination`, replacing whatever is there.
    /// Access has already been settled by the caller through
    /// [`Fetcher::check_visibility`].
    fn clone_into<'a>(
        &'a self,
        repo_url: &'a str,
        destination: &'a Path,
        credential: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>>;
}

#[derive(Deserialize)]
struct RepoInfo {
    private: bool,
}

#[derive(Deserialize)]
struct UserInfo {
    login: String,
}

/// [`Fetcher`] backed by the GitHub REST API and the `git` binary.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    client: reqwest::Client,
    api_base: String,
    clone_base: String,
    git_bin: PathBuf,
}

impl GitFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_owned(),
            clone_base: DEFAULT_CLONE_BASE.to_owned(),
            git_bin: PathBuf::from("git"),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Base URL the `owner/name.git` path is appended to when cloning.
    #[must_use]
    pub fn with_clone_base(mut self, clone_base: impl Into<String>) -> Self {
        self.clone_base = clone_base.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_git_bin(mut self, git_bin: impl Into<PathBuf>) -> Self {
        self.git_bin = git_bin.into();
        self
    }

    pub async fn check_visibility(&self, repo_url: &str, credential: Option<&str>) -> Visibility {
        let slug = match parse_repo_url(repo_url) {
            Ok(slug) => slug,
            Err(e) => {
                tracing::warn!("visibility check skipped, assuming public: {e}");
                return Visibility::Public;
            }
        };

        let url = format!("{}/repos/{}/{}", self.api_base, slug.owner, slug.name);
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                tracing::info!(repo = %slug, "repository not visible anonymously, treating as private");
                Visibility::Private
            }
            Ok(resp) if resp.status() == StatusCode::OK => match resp.json::<RepoInfo>().await {
                Ok(info) if info.private => Visibility::Private,
                Ok(_) => Visibility::Public,
                Err(e) => {
                    tracing::warn!(repo = %slug, "malformed visibility response, assuming public: {e}");
                    Visibility::Public
                }
            },
            Ok(resp) => {
                tracing::warn!(
                    repo = %slug,
                    status = %resp.status(),
                    "unexpected visibility response, assuming public"
                );
                Visibility::Public
            }
            Err(e) => {
                tracing::warn!(repo = %slug, "visibility check failed, assuming public: {e}");
                Visibility::Public
            }
        }
    }

    /// Resolve the login behind an access token; `None` on any failure.
    pub async fn authenticated_user(&self, token: &str) -> Option<String> {
        let resp = self
            .client
            .get(format!("{}/user", self.api_base))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::debug!(status = %resp.status(), "token user lookup rejected");
            return None;
        }
        resp.json::<UserInfo>().await.ok().map(|u| u.login)
    }

    /// # Errors
    ///
    /// [`IndexError::AccessDenied`] for a private repository without a
    /// credential, [`IndexError::Clone`] when `git` fails.
    pub async fn clone_repo(
        &self,
        repo_url: &str,
        destination: &Path,
        credential: Option<&str>,
    ) -> Result<()> {
        if credential.is_none() && self.check_visibility(repo_url, None).await.is_private() {
            return Err(IndexError::AccessDenied(parse_repo_url(repo_url)?.to_string()));
        }
        self.clone_into(repo_url, destination, credential).await
    }

    /// Clone without probing visibility first.
    ///
    /// # Errors
    ///
    /// [`IndexError::Clone`] when `git` fails.
    pub async fn clone_into(
        &self,
        repo_url: &str,
        destination: &Path,
        credential: Option<&str>,
    ) -> Result<()> {
        let slug = parse_repo_url(repo_url)?;
        reset_destination(destination).await?;
        let clone_url = self.clone_url(&slug, credential)?;

        tracing::info!(repo = %slug, dest = %destination.display(), "cloning repository");
        let output = Command::new(&self.git_bin)
            .args(["clone", "--quiet"])
            .arg(clone_url.as_str())
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CloneError::Transport(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = classify_clone_failure(&stderr, credential);
            tracing::warn!(repo = %slug, "clone failed: {err}");
            return Err(err.into());
        }
        Ok(())
    }

    fn clone_url(&self, slug: &RepoSlug, credential: Option<&str>) -> Result<Url> {
        let raw = format!("{}/{}/{}.git", self.clone_base, slug.owner, slug.name);
        let mut url = Url::parse(&raw).map_err(|_| IndexError::InvalidUrl(raw.clone()))?;
        if let Some(token) = credential {
            url.set_username("x-access-token")
                .and_then(|()| url.set_password(Some(token)))
                .map_err(|()| IndexError::InvalidUrl(raw))?;
        }
        Ok(url)
    }
}

impl Fetcher for GitFetcher {
    fn check_visibility<'a>(
        &'a self,
        repo_url: &'a str,
        credential: Option<&'a str>,
    ) -> BoxFuture<'a, Visibility> {
        Box::pin(self.check_visibility(repo_url, credential))
    }

    fn clone_into<'a>(
        &'a self,
        repo_url: &'a str,
        destination: &'a Path,
        credential: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.clone_into(repo_url, destination, credential))
    }
}

/// Map `git clone` stderr to a failure kind. The token is scrubbed from any
/// text that is kept.
fn classify_clone_failure(stderr: &str, credential: Option<&str>) -> CloneError {
    let lower = stderr.to_lowercase();
    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("invalid username or password")
        || lower.contains("terminal prompts disabled")
        || lower.contains("403")
    {
        return CloneError::Auth;
    }
    if lower.contains("repository not found")
        || lower.contains("not found")
        || lower.contains("does not appear to be a git repository")
        || lower.contains("does not exist")
    {
        return CloneError::NotFound;
    }
    let mut message = stderr.trim().to_owned();
    if let Some(token) = credential.filter(|t| !t.is_empty()) {
        message = message.replace(token, "***");
    }
    CloneError::Transport(message)
}

/// Remove `path` if present, first making every entry writable so
/// read-only files left by a previous clone do not block deletion.
///
/// # Errors
///
/// Returns an error if the tree cannot be removed.
pub async fn reset_destination(path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        if std::fs::symlink_metadata(&path).is_err() {
            return Ok(());
        }
        make_writable(&path)?;
        if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        }
    })
    .await
    .map_err(|e| IndexError::Other(format!("cleanup task failed: {e}")))??;
    Ok(())
}

fn make_writable(path: &Path) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o700);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    std::fs::set_permissions(path, perms)?;

    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}
