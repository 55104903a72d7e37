//! Transport authentication
//!
//! The remote URL decides, once, how every remote operation (clone, fetch,
//! push) authenticates:
//! - `http://` / `https://`: static username and password
//! - `ssh://`, `git+ssh://` and scp-like `user@host:path`: SSH agent or
//!   identity files, tuned by OpenSSH-style session options
//! - `file://` and absolute paths: no credentials
//!
//! Any other scheme is rejected during validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use git2::{CertificateCheckStatus, Cred, CredentialType, RemoteCallbacks};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::core::config::RepoConfig;
use crate::error::{MirrorError, Result};

/// libgit2 asks again after every rejected credential; stop after this many
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Default SSH login when neither the URL nor the options name one
const DEFAULT_SSH_USER: &str = "git";

// [user@]host:path with no scheme, e.g. git@github.com:owner/repo.git
static SCP_LIKE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^@/:\s]+@)?[^@/:\s]+:[^\s]+$").unwrap());

/// How remote operations authenticate
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// HTTP(S) with a static username and password
    HttpBasic {
        username: String,
        password: SecretString,
    },
    /// SSH with agent or identity-file keys
    SshKey(SshSession),
    /// Local filesystem remote, no credentials
    Local,
}

impl AuthMode {
    /// Resolve the authentication mode for a configuration
    pub fn from_config(config: &RepoConfig) -> Result<Self> {
        match classify_url(config.url.trim())? {
            Transport::Http => Ok(AuthMode::HttpBasic {
                username: config.username.clone(),
                password: config.password.clone(),
            }),
            Transport::Ssh => Ok(AuthMode::SshKey(SshSession::from_options(
                &config.ssh_options,
            ))),
            Transport::Local => Ok(AuthMode::Local),
        }
    }

    /// Short name for log output
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::HttpBasic { .. } => "http-basic",
            AuthMode::SshKey(_) => "ssh-key",
            AuthMode::Local => "local",
        }
    }

    /// Build the callbacks attached to a clone, fetch or push
    pub fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();

        match self {
            AuthMode::HttpBasic { username, password } => {
                let mut attempts = 0;
                callbacks.credentials(move |_url, _username_from_url, allowed_types| {
                    check_password_attempt(&mut attempts, allowed_types)?;
                    Cred::userpass_plaintext(username, password.expose_secret())
                });
            }
            AuthMode::SshKey(session) => session.attach(&mut callbacks),
            AuthMode::Local => {}
        }

        callbacks
    }
}

/// Transport family of a remote URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Http,
    Ssh,
    Local,
}

fn classify_url(url: &str) -> Result<Transport> {
    if url.contains("://") {
        let parsed = Url::parse(url)
            .map_err(|e| MirrorError::InvalidConfig(format!("cannot parse url '{}': {}", url, e)))?;

        return match parsed.scheme() {
            "http" | "https" => Ok(Transport::Http),
            "ssh" | "git+ssh" | "ssh+git" => Ok(Transport::Ssh),
            "file" => Ok(Transport::Local),
            other => Err(MirrorError::InvalidConfig(format!(
                "unsupported url scheme '{}' in '{}'",
                other, url
            ))),
        };
    }

    if Path::new(url).is_absolute() {
        return Ok(Transport::Local);
    }

    if SCP_LIKE_URL.is_match(url) {
        return Ok(Transport::Ssh);
    }

    Err(MirrorError::InvalidConfig(format!(
        "unrecognized remote url '{}'",
        url
    )))
}

/// Where an SSH key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Agent,
    File(PathBuf),
}

/// SSH session settings derived from OpenSSH-style options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSession {
    /// Login user, overriding the one in the URL
    pub user: Option<String>,
    /// Private key file
    pub identity_file: Option<PathBuf>,
    /// Skip the agent and use only the identity file
    pub identities_only: bool,
    /// Verify the host key against known hosts
    pub strict_host_key_checking: bool,
    /// Option names the transport cannot honor
    pub ignored: Vec<String>,
}

impl Default for SshSession {
    fn default() -> Self {
        Self {
            user: None,
            identity_file: None,
            identities_only: false,
            strict_host_key_checking: true,
            ignored: Vec::new(),
        }
    }
}

impl SshSession {
    /// Interpret session options; keys are matched case-insensitively
    pub fn from_options(options: &BTreeMap<String, String>) -> Self {
        let mut session = SshSession::default();

        for (key, value) in options {
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "user" => session.user = Some(value.to_string()),
                "identityfile" => session.identity_file = Some(expand_home(value)),
                "identitiesonly" => session.identities_only = is_yes(value),
                "stricthostkeychecking" => {
                    session.strict_host_key_checking =
                        !matches!(value.to_ascii_lowercase().as_str(), "no" | "off")
                }
                _ => session.ignored.push(key.clone()),
            }
        }

        session
    }

    /// Keys offered to the server, in order
    pub fn key_sources(&self) -> Vec<KeySource> {
        let mut sources = Vec::new();
        if let Some(path) = &self.identity_file {
            sources.push(KeySource::File(path.clone()));
        }
        if !self.identities_only || self.identity_file.is_none() {
            sources.push(KeySource::Agent);
        }
        sources
    }

    /// Apply the session settings to a set of remote callbacks
    pub fn attach<'a>(&'a self, callbacks: &mut RemoteCallbacks<'a>) {
        for key in &self.ignored {
            tracing::warn!("SSH option '{}' is not supported by the git transport; ignoring it", key);
        }

        let mut credentials = SshCredentials::new(self);
        callbacks.credentials(move |_url, username_from_url, allowed_types| {
            match credentials.next_step(username_from_url, allowed_types)? {
                SshStep::Username(user) => Cred::username(&user),
                SshStep::Agent(user) => {
                    tracing::debug!("Offering SSH agent keys for user {}", user);
                    Cred::ssh_key_from_agent(&user)
                }
                SshStep::KeyFile { user, path } => {
                    tracing::debug!("Offering SSH key {} for user {}", path.display(), user);
                    Cred::ssh_key(&user, None, &path, None)
                }
            }
        });

        if !self.strict_host_key_checking {
            callbacks.certificate_check(|_cert, host| {
                tracing::debug!("Accepting host key of {} without verification", host);
                Ok(CertificateCheckStatus::CertificateOk)
            });
        }
    }
}

/// Count a username/password request, failing once the remote has rejected
/// the pair too often or does not accept passwords at all
fn check_password_attempt(
    attempts: &mut usize,
    allowed_types: CredentialType,
) -> std::result::Result<(), git2::Error> {
    *attempts += 1;
    if *attempts > MAX_CREDENTIAL_ATTEMPTS {
        return Err(git2::Error::from_str(
            "remote rejected the configured username and password",
        ));
    }
    if !allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
        return Err(git2::Error::from_str(
            "remote does not accept username/password authentication",
        ));
    }
    Ok(())
}

/// One answer to an SSH credential request
#[derive(Debug, Clone, PartialEq, Eq)]
enum SshStep {
    Username(String),
    Agent(String),
    KeyFile { user: String, path: PathBuf },
}

/// Walks the session's key sources across the requests of one operation
struct SshCredentials<'a> {
    session: &'a SshSession,
    sources: Vec<KeySource>,
    next_source: usize,
    username_sent: bool,
}

impl<'a> SshCredentials<'a> {
    fn new(session: &'a SshSession) -> Self {
        Self {
            session,
            sources: session.key_sources(),
            next_source: 0,
            username_sent: false,
        }
    }

    fn next_step(
        &mut self,
        username_from_url: Option<&str>,
        allowed_types: CredentialType,
    ) -> std::result::Result<SshStep, git2::Error> {
        let user = self
            .session
            .user
            .as_deref()
            .or(username_from_url)
            .unwrap_or(DEFAULT_SSH_USER)
            .to_string();

        if allowed_types.contains(CredentialType::USERNAME) {
            if self.username_sent {
                return Err(git2::Error::from_str(&format!(
                    "remote rejected SSH user '{}'",
                    user
                )));
            }
            self.username_sent = true;
            return Ok(SshStep::Username(user));
        }

        let source = self
            .sources
            .get(self.next_source)
            .ok_or_else(|| git2::Error::from_str("remote rejected every offered SSH key"))?;
        self.next_source += 1;

        Ok(match source {
            KeySource::Agent => SshStep::Agent(user),
            KeySource::File(path) => SshStep::KeyFile {
                user,
                path: path.clone(),
            },
        })
    }
}

fn is_yes(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "true" | "on")
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
