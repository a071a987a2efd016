//! Domain types for issue relationships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository addressed by owner login and repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,
}

impl RepoRef {
    /// Create a new repository reference.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Issue is open.
    Open,

    /// Issue has been closed.
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A read-only snapshot of an issue as returned by the remote service.
///
/// The `id` is the globally-unique numeric identifier; `number` is the
/// per-repository display number. The two are never interchangeable:
/// relationship writes take the global `id` of the other endpoint, while
/// the anchored issue is addressed by repository and `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    /// Globally-unique numeric identifier.
    pub id: u64,

    /// Per-repository display number.
    pub number: u64,

    /// Issue title.
    pub title: String,

    /// Lifecycle state.
    pub state: IssueState,

    /// Canonical web URL.
    pub html_url: String,

    /// Author login, when known.
    pub author: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}] {}", self.number, self.state, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ref_displays_as_slug() {
        let repo = RepoRef::new("octocat", "hello-world");
        assert_eq!(repo.to_string(), "octocat/hello-world");
    }

    #[test]
    fn issue_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&IssueState::Open).unwrap(), "\"open\"");
        assert_eq!(
            serde_json::to_string(&IssueState::Closed).unwrap(),
            "\"closed\""
        );
    }

    #[test]
    fn issue_state_deserializes_from_api_strings() {
        let open: IssueState = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(open, IssueState::Open);
        let closed: IssueState = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(closed, IssueState::Closed);
    }
}
