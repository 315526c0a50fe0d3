//! Remote repository metadata.
//!
//! Metadata only decorates the document header, so every failure here turns
//! into [`MetadataLookup::Unavailable`] instead of an error.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Default REST endpoint for metadata lookups.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A response field that may be missing, present as `null`, or set.
///
/// `None` is a missing key, `Some(None)` an explicit `null`.
pub type MetadataField<T> = Option<Option<T>>;

/// Descriptive metadata about a remote repository.
///
/// A missing key and a `null` value are kept apart: the document shows a
/// placeholder for the former and `None` for the latter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// `owner/name`
    #[serde(default, deserialize_with = "present")]
    pub full_name: MetadataField<String>,

    /// Free-form description
    #[serde(default, deserialize_with = "present")]
    pub description: MetadataField<String>,

    /// Primary language
    #[serde(default, deserialize_with = "present")]
    pub language: MetadataField<String>,

    /// Star count
    #[serde(rename = "stargazers_count", default, deserialize_with = "present")]
    pub star_count: MetadataField<u64>,

    /// Fork count
    #[serde(rename = "forks_count", default, deserialize_with = "present")]
    pub fork_count: MetadataField<u64>,
}

impl RepositoryMetadata {
    /// Returns true if no key was present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.description.is_none()
            && self.language.is_none()
            && self.star_count.is_none()
            && self.fork_count.is_none()
    }
}

/// Only runs for keys that are present, so `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<MetadataField<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Outcome of a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    /// The remote described the repository.
    Found(RepositoryMetadata),

    /// No metadata; the reason is kept for the logs.
    Unavailable {
        /// Why the lookup produced nothing
        reason: String,
    },
}

impl MetadataLookup {
    /// Returns the metadata when the lookup succeeded.
    #[must_use]
    pub const fn metadata(&self) -> Option<&RepositoryMetadata> {
        match self {
            Self::Found(metadata) => Some(metadata),
            Self::Unavailable { .. } => None,
        }
    }
}

impl From<Result<RepositoryMetadata>> for MetadataLookup {
    fn from(result: Result<RepositoryMetadata>) -> Self {
        match result {
            Ok(metadata) => Self::Found(metadata),
            Err(e) => Self::Unavailable {
                reason: e.to_string(),
            },
        }
    }
}

/// Retrieves metadata for a repository URL.
pub trait MetadataSource {
    /// Looks up `repo_url`. Never fails; problems become [`MetadataLookup::Unavailable`].
    fn fetch(&self, repo_url: &str) -> MetadataLookup;
}

/// Unauthenticated client for the `GET /repos/{owner}/{name}` endpoint.
#[derive(Debug, Clone)]
pub struct GitHubMetadata {
    client: Client,
    api_base: String,
}

impl GitHubMetadata {
    /// Creates a client for `api_base`, e.g. [`DEFAULT_API_BASE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(client_builder().build()?, api_base))
    }

    /// Uses a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, owner: &str, name: &str) -> Result<RepositoryMetadata> {
        let url = format!("{}/repos/{owner}/{name}", self.api_base);
        debug!("Fetching repository metadata from {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::metadata(format!("{url} returned {status}")));
        }

        Ok(response.json()?)
    }
}

impl MetadataSource for GitHubMetadata {
    fn fetch(&self, repo_url: &str) -> MetadataLookup {
        let Some((owner, name)) = parse_owner_repo(repo_url) else {
            return MetadataLookup::Unavailable {
                reason: format!("'{repo_url}' does not name an owner and repository"),
            };
        };

        let lookup = MetadataLookup::from(self.request(&owner, &name));
        if let MetadataLookup::Unavailable { reason } = &lookup {
            warn!("Could not fetch repo info: {}", reason);
        }
        lookup
    }
}

fn client_builder() -> reqwest::blocking::ClientBuilder {
    Client::builder().user_agent(USER_AGENT)
}

/// Source that never finds anything, for offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataSource for NoMetadata {
    fn fetch(&self, _repo_url: &str) -> MetadataLookup {
        MetadataLookup::Unavailable {
            reason: "metadata lookup disabled".to_string(),
        }
    }
}

/// Extracts `(owner, name)` from `<host>/<owner>/<name>[.git]`.
///
/// Accepts an optional scheme and the `git@host:owner/name` form.
#[must_use]
pub fn parse_owner_repo(repo_url: &str) -> Option<(String, String)> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let without_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);

    let scp_like = !trimmed.contains("://") && without_scheme.contains('@');
    let normalized = if scp_like {
        without_scheme.replacen(':', "/", 1)
    } else {
        without_scheme.to_string()
    };

    let mut segments = normalized.split('/').skip(1);
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let name = segments.next().map(|s| s.strip_suffix(".git").unwrap_or(s))?;
    if name.is_empty() {
        return None;
    }

    Some((owner.to_string(), name.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Answers one HTTP request with `status` and `body`, reporting the request head.
    pub(crate) fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            tx.send(String::from_utf8_lossy(&request).to_string()).unwrap();

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        (format!("http://{addr}"), rx)
    }

    pub(crate) fn local_source(base: String) -> GitHubMetadata {
        GitHubMetadata::with_client(client_builder().no_proxy().build().unwrap(), base)
    }

    #[test]
    fn test_parse_owner_repo() {
        let expected = Some(("octo".to_string(), "demo".to_string()));

        assert_eq!(parse_owner_repo("https://github.com/octo/demo"), expected);
        assert_eq!(parse_owner_repo("https://github.com/octo/demo.git"), expected);
        assert_eq!(parse_owner_repo("https://github.com/octo/demo/"), expected);
        assert_eq!(parse_owner_repo("github.com/octo/demo"), expected);
        assert_eq!(parse_owner_repo("git@github.com:octo/demo.git"), expected);
        assert_eq!(parse_owner_repo("https://github.com/octo"), None);
        assert_eq!(parse_owner_repo("not a url"), None);
        assert_eq!(
            parse_owner_repo("http://localhost:8080/octo/demo"),
            Some(("octo".to_string(), "demo".to_string()))
        );
    }

    #[test]
    fn test_fetch_success() {
        let (base, requests) = serve_once(
            "200 OK",
            r#"{"full_name":"octo/demo","description":null,"language":"Rust","stargazers_count":42,"forks_count":7,"private":false}"#,
        );
        let source = local_source(base);

        let lookup = source.fetch("https://github.com/octo/demo.git");

        let request = requests.recv().unwrap();
        assert!(request.starts_with("GET /repos/octo/demo "));
        assert!(request.to_lowercase().contains("user-agent: repo-digest/"));

        let metadata = lookup.metadata().unwrap();
        assert_eq!(metadata.full_name, Some(Some("octo/demo".to_string())));
        assert_eq!(metadata.description, Some(None));
        assert_eq!(metadata.language, Some(Some("Rust".to_string())));
        assert_eq!(metadata.star_count, Some(Some(42)));
        assert_eq!(metadata.fork_count, Some(Some(7)));
    }

    #[test]
    fn test_missing_key_differs_from_null() {
        let metadata: RepositoryMetadata =
            serde_json::from_str(r#"{"full_name":"octo/demo","language":null}"#).unwrap();

        assert_eq!(metadata.full_name, Some(Some("octo/demo".to_string())));
        assert_eq!(metadata.language, Some(None));
        assert_eq!(metadata.description, None);
        assert_eq!(metadata.star_count, None);
        assert!(!metadata.is_empty());
        assert!(serde_json::from_str::<RepositoryMetadata>("{}").unwrap().is_empty());
    }

    #[test]
    fn test_fetch_not_found_is_unavailable() {
        let (base, _requests) = serve_once("404 Not Found", r#"{"message":"Not Found"}"#);
        let source = local_source(base);

        let lookup = source.fetch("https://github.com/octo/missing");

        assert!(matches!(lookup, MetadataLookup::Unavailable { ref reason } if reason.contains("404")));
    }

    #[test]
    fn test_fetch_malformed_body_is_unavailable() {
        let (base, _requests) = serve_once("200 OK", "[1, 2");
        let source = local_source(base);

        assert!(source.fetch("https://github.com/octo/demo").metadata().is_none());
    }

    #[test]
    fn test_fetch_unparseable_url_is_unavailable() {
        let source = GitHubMetadata::new("http://127.0.0.1:9").unwrap();

        assert!(source.fetch("demo").metadata().is_none());
    }

    #[test]
    fn test_no_metadata() {
        assert!(NoMetadata.fetch("https://github.com/octo/demo").metadata().is_none());
    }
}
