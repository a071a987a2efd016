//! Tool argument records and response envelopes.
//!
//! Argument structs derive `JsonSchema`, and the doc comments on their
//! fields become the descriptions advertised in each tool's input
//! schema. Range rules the schema cannot express (limit bounds, positive
//! ids) are enforced by [`validate`]-style methods before any remote
//! call is made.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trellis_github::{IssueRef, Placement, RepoRef};

use crate::error::{Error, Result};
use crate::render::PageRequest;

/// Default page size for list tools.
pub const DEFAULT_LIMIT: u64 = 20;

/// Largest accepted page size.
pub const MAX_LIMIT: u64 = 100;

/// Output rendering selector accepted by read tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown-ish text for direct display.
    #[default]
    Human,

    /// The structured envelope serialized as JSON text.
    Structured,
}

fn repo_args_valid(owner: &str, repo: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(Error::InvalidArguments("owner must not be empty".into()));
    }
    if repo.trim().is_empty() {
        return Err(Error::InvalidArguments("repo must not be empty".into()));
    }
    Ok(())
}

fn positive(name: &str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(Error::InvalidArguments(format!(
            "{name} must be a positive integer"
        )));
    }
    Ok(value)
}

fn page_request(limit: Option<u64>, offset: Option<u64>) -> Result<PageRequest> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(Error::InvalidArguments(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }
    let offset = offset.unwrap_or(0);
    Ok(PageRequest {
        limit: usize::try_from(limit).unwrap_or(usize::MAX),
        offset: usize::try_from(offset).unwrap_or(usize::MAX),
    })
}

/// Arguments shared by the three list tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the issue whose relationships to list.
    pub issue_number: u64,

    /// Page size, 1 to 100. Defaults to 20.
    #[serde(default)]
    pub limit: Option<u64>,

    /// Number of results to skip. Defaults to 0.
    #[serde(default)]
    pub offset: Option<u64>,

    /// Output rendering: `human` (default) or `structured`.
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl ListParams {
    /// Validate and split into repository, issue number, page, format.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` for empty repo coordinates, a zero issue
    /// number, or an out-of-range limit. Nothing remote runs first.
    pub fn validate(&self) -> Result<(RepoRef, u64, PageRequest, OutputFormat)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        let page = page_request(self.limit, self.offset)?;
        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            page,
            self.format.unwrap_or_default(),
        ))
    }
}

/// Arguments for `get_parent_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GetParentParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the issue whose parent to fetch.
    pub issue_number: u64,

    /// Output rendering: `human` (default) or `structured`.
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl GetParentParams {
    /// Validate and split into repository, issue number, format.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` for empty repo coordinates or a zero
    /// issue number.
    pub fn validate(&self) -> Result<(RepoRef, u64, OutputFormat)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            self.format.unwrap_or_default(),
        ))
    }
}

/// Arguments for adding or removing a blocking dependency.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BlockingEdgeParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the blocked issue.
    pub issue_number: u64,

    /// Global id (not display number) of the blocking issue.
    pub blocking_issue_id: u64,
}

impl BlockingEdgeParams {
    /// Validate and split into repository, issue number, blocking id.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` for empty repo coordinates or
    /// non-positive identifiers.
    pub fn validate(&self) -> Result<(RepoRef, u64, u64)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        let blocking = positive("blocking_issue_id", self.blocking_issue_id)?;
        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            blocking,
        ))
    }
}

/// Arguments for `add_sub_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddSubIssueParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the parent issue.
    pub issue_number: u64,

    /// Global id (not display number) of the issue to attach as a child.
    pub sub_issue_id: u64,

    /// Move the child here even if it already has another parent.
    #[serde(default)]
    pub replace_parent: bool,
}

impl AddSubIssueParams {
    /// Validate and split into repository, issue number, child id, flag.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` for empty repo coordinates or
    /// non-positive identifiers.
    pub fn validate(&self) -> Result<(RepoRef, u64, u64, bool)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        let child = positive("sub_issue_id", self.sub_issue_id)?;
        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            child,
            self.replace_parent,
        ))
    }
}

/// Arguments for `remove_sub_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RemoveSubIssueParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the parent issue.
    pub issue_number: u64,

    /// Global id (not display number) of the child to detach.
    pub sub_issue_id: u64,
}

impl RemoveSubIssueParams {
    /// Validate and split into repository, issue number, child id.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` for empty repo coordinates or
    /// non-positive identifiers.
    pub fn validate(&self) -> Result<(RepoRef, u64, u64)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        let child = positive("sub_issue_id", self.sub_issue_id)?;
        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            child,
        ))
    }
}

/// Arguments for `reprioritize_sub_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReprioritizeParams {
    /// Repository owner (user or organization login).
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// Display number of the parent issue.
    pub issue_number: u64,

    /// Global id (not display number) of the child to move.
    pub sub_issue_id: u64,

    /// Global id of the sibling to place the child after.
    /// Exactly one of `after_id` / `before_id` is required.
    #[serde(default)]
    pub after_id: Option<u64>,

    /// Global id of the sibling to place the child before.
    /// Exactly one of `after_id` / `before_id` is required.
    #[serde(default)]
    pub before_id: Option<u64>,
}

impl ReprioritizeParams {
    /// Validate and split into repository, issue number, child id,
    /// placement.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArguments` when neither or both anchors are
    /// supplied, or for the usual coordinate/id rules. The store is
    /// never reached on failure.
    pub fn validate(&self) -> Result<(RepoRef, u64, u64, Placement)> {
        repo_args_valid(&self.owner, &self.repo)?;
        let number = positive("issue_number", self.issue_number)?;
        let child = positive("sub_issue_id", self.sub_issue_id)?;

        let placement = match (self.after_id, self.before_id) {
            (Some(anchor), None) => Placement::After(positive("after_id", anchor)?),
            (None, Some(anchor)) => Placement::Before(positive("before_id", anchor)?),
            (None, None) => {
                return Err(Error::InvalidArguments(
                    "exactly one of after_id or before_id is required; neither was provided"
                        .into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArguments(
                    "exactly one of after_id or before_id is required; both were provided".into(),
                ));
            }
        };

        Ok((
            RepoRef::new(self.owner.clone(), self.repo.clone()),
            number,
            child,
            placement,
        ))
    }
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// Issue snapshot as carried in structured tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummary {
    /// Globally-unique numeric id.
    pub id: u64,

    /// Per-repository display number.
    pub number: u64,

    /// Issue title.
    pub title: String,

    /// Lifecycle state, `open` or `closed`.
    pub state: String,

    /// Canonical web URL.
    pub url: String,

    /// Author login, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Creation timestamp (RFC 3339).
    pub created_at: String,

    /// Last-update timestamp (RFC 3339).
    pub updated_at: String,
}

impl From<IssueRef> for IssueSummary {
    fn from(issue: IssueRef) -> Self {
        Self {
            id: issue.id,
            number: issue.number,
            title: issue.title,
            state: issue.state.to_string(),
            url: issue.html_url,
            author: issue.author,
            created_at: issue.created_at.to_rfc3339(),
            updated_at: issue.updated_at.to_rfc3339(),
        }
    }
}

/// Pagination envelope wrapping every list result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Size of the full, unpaginated result set.
    pub total: usize,

    /// Number of items in this slice.
    pub returned: usize,

    /// Requested offset.
    pub offset: usize,

    /// Effective page size.
    pub limit: usize,

    /// Whether more results exist past this slice.
    pub has_more: bool,

    /// Offset to request next; present exactly when `has_more`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

/// Structured payload of the list tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueListResponse {
    /// The requested slice, in server order.
    pub issues: Vec<IssueSummary>,

    /// Pagination envelope for the slice.
    pub page: Page,
}

/// Structured payload of `get_parent_issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentResponse {
    /// Whether the issue has a parent.
    pub has_parent: bool,

    /// The parent, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<IssueSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::{json, Value};

    fn list_params(value: Value) -> std::result::Result<ListParams, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn list_params_defaults() {
        let params = list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 42
        }))
        .unwrap();
        let (repo, number, page, format) = params.validate().unwrap();
        assert_eq!(repo.to_string(), "o/r");
        assert_eq!(number, 42);
        assert_eq!(page.limit, 20);
        assert_eq!(page.offset, 0);
        assert_eq!(format, OutputFormat::Human);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::too_large(101)]
    fn out_of_range_limit_is_rejected(#[case] limit: u64) {
        let params = list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 42, "limit": limit
        }))
        .unwrap();
        let err = params.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
        assert!(err.to_string().contains("limit"));
    }

    #[rstest]
    #[case::min(1)]
    #[case::max(100)]
    fn boundary_limits_are_accepted(#[case] limit: u64) {
        let params = list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 42, "limit": limit
        }))
        .unwrap();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn negative_offset_fails_to_decode() {
        assert!(list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 42, "offset": -1
        }))
        .is_err());
    }

    #[test]
    fn zero_issue_number_is_rejected() {
        let params = list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 0
        }))
        .unwrap();
        assert!(matches!(
            params.validate().unwrap_err(),
            Error::InvalidArguments(_)
        ));
    }

    #[test]
    fn empty_owner_is_rejected() {
        let params = list_params(json!({
            "owner": "  ", "repo": "r", "issue_number": 1
        }))
        .unwrap();
        assert!(matches!(
            params.validate().unwrap_err(),
            Error::InvalidArguments(_)
        ));
    }

    #[test]
    fn unknown_field_fails_to_decode() {
        assert!(list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 1, "per_page": 5
        }))
        .is_err());
    }

    #[rstest]
    #[case::neither(None, None, "neither")]
    #[case::both(Some(1), Some(2), "both")]
    fn reprioritize_requires_exactly_one_anchor(
        #[case] after: Option<u64>,
        #[case] before: Option<u64>,
        #[case] expected: &str,
    ) {
        let params = ReprioritizeParams {
            owner: "o".into(),
            repo: "r".into(),
            issue_number: 50,
            sub_issue_id: 501,
            after_id: after,
            before_id: before,
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains(expected));
    }

    #[rstest]
    #[case::after(Some(7), None)]
    #[case::before(None, Some(7))]
    fn reprioritize_accepts_single_anchor(
        #[case] after: Option<u64>,
        #[case] before: Option<u64>,
    ) {
        let params = ReprioritizeParams {
            owner: "o".into(),
            repo: "r".into(),
            issue_number: 50,
            sub_issue_id: 501,
            after_id: after,
            before_id: before,
        };
        let (_, _, _, placement) = params.validate().unwrap();
        match (after, placement) {
            (Some(a), Placement::After(anchor)) => assert_eq!(anchor, a),
            (None, Placement::Before(anchor)) => assert_eq!(anchor, 7),
            other => panic!("unexpected placement {other:?}"),
        }
    }

    #[test]
    fn format_parses_lowercase_values() {
        let params = list_params(json!({
            "owner": "o", "repo": "r", "issue_number": 1, "format": "structured"
        }))
        .unwrap();
        let (_, _, _, format) = params.validate().unwrap();
        assert_eq!(format, OutputFormat::Structured);
    }

    #[test]
    fn issue_summary_keeps_id_and_number_distinct() {
        use chrono::TimeZone;
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let summary = IssueSummary::from(IssueRef {
            id: 123_456_789,
            number: 10,
            title: "t".into(),
            state: trellis_github::IssueState::Closed,
            html_url: "https://example.com".into(),
            author: None,
            created_at: ts,
            updated_at: ts,
        });
        assert_eq!(summary.id, 123_456_789);
        assert_eq!(summary.number, 10);
        assert_eq!(summary.state, "closed");
        assert_eq!(summary.created_at, "2024-03-01T12:00:00+00:00");
    }
}
