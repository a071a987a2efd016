//! Tool implementations for the trellis MCP server.
//!
//! Each method validates its arguments first, so the relation store is
//! never reached with bad input, then performs the remote call(s) and
//! shapes the result into a [`ToolOutput`].

use std::sync::Arc;

use serde_json::Value;
use trellis_github::{IssueRef, RelationStore, RepoRef};

use crate::error::Result;
use crate::models::{
    AddSubIssueParams, BlockingEdgeParams, GetParentParams, IssueListResponse, IssueSummary,
    ListParams, OutputFormat, ParentResponse, RemoveSubIssueParams, ReprioritizeParams,
};
use crate::render::{enforce_size_cap, paginate, render_issue_line, render_issue_list, PageRequest};

/// Shaped output of one tool invocation.
///
/// `text` is the primary display block; `structured`, when present,
/// mirrors the same data for programmatic consumption. The two are
/// produced from one shared envelope and can never disagree.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Primary human-readable text.
    pub text: String,

    /// Machine-readable mirror of the same data.
    pub structured: Option<Value>,
}

/// Which list relationship is being rendered.
#[derive(Debug, Clone, Copy)]
enum ListKind {
    BlockedBy,
    Blocking,
    SubIssues,
}

impl ListKind {
    fn heading(self, repo: &RepoRef, number: u64) -> String {
        match self {
            Self::BlockedBy => format!("Issues blocking {repo}#{number}"),
            Self::Blocking => format!("Issues blocked by {repo}#{number}"),
            Self::SubIssues => format!("Sub-issues of {repo}#{number} (priority order)"),
        }
    }

    fn empty_sentence(self, repo: &RepoRef, number: u64) -> String {
        match self {
            Self::BlockedBy => format!("Issue {repo}#{number} is not blocked by any issues."),
            Self::Blocking => format!("Issue {repo}#{number} is not blocking any issues."),
            Self::SubIssues => format!("Issue {repo}#{number} has no sub-issues."),
        }
    }

    /// Sub-issue listings are numbered: position conveys priority.
    fn numbered(self) -> bool {
        matches!(self, Self::SubIssues)
    }
}

/// Tool implementations over a relation store.
pub struct Tools {
    store: Arc<dyn RelationStore>,
}

impl Tools {
    /// Create a new `Tools` instance over the given store.
    pub fn new(store: Arc<dyn RelationStore>) -> Self {
        Self { store }
    }

    /// List the issues blocking an issue.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or a failed remote call.
    pub async fn get_blocked_by(&self, params: ListParams) -> Result<ToolOutput> {
        let (repo, number, page, format) = params.validate()?;
        let full = self.store.blocked_by(&repo, number).await?;
        list_output(ListKind::BlockedBy, &repo, number, full, page, format)
    }

    /// List the issues an issue is blocking.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or a failed remote call.
    pub async fn get_blocking(&self, params: ListParams) -> Result<ToolOutput> {
        let (repo, number, page, format) = params.validate()?;
        let full = self.store.blocking(&repo, number).await?;
        list_output(ListKind::Blocking, &repo, number, full, page, format)
    }

    /// Add a blocking dependency.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments, a missing issue, or an
    /// already-existing edge.
    pub async fn add_blocking_dependency(&self, params: BlockingEdgeParams) -> Result<ToolOutput> {
        let (repo, number, blocking_id) = params.validate()?;
        self.store.add_blocked_by(&repo, number, blocking_id).await?;
        Ok(confirmation(format!(
            "Issue {repo}#{number} is now blocked by issue {blocking_id}."
        )))
    }

    /// Remove a blocking dependency.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or an absent edge.
    pub async fn remove_blocking_dependency(
        &self,
        params: BlockingEdgeParams,
    ) -> Result<ToolOutput> {
        let (repo, number, blocking_id) = params.validate()?;
        self.store
            .remove_blocked_by(&repo, number, blocking_id)
            .await?;
        Ok(confirmation(format!(
            "Issue {repo}#{number} is no longer blocked by issue {blocking_id}."
        )))
    }

    /// Fetch the parent of an issue, or report that it has none.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or a failed remote call.
    /// An issue without a parent is a successful result, not an error.
    pub async fn get_parent_issue(&self, params: GetParentParams) -> Result<ToolOutput> {
        let (repo, number, format) = params.validate()?;
        let parent = self.store.parent_of(&repo, number).await?;

        let response = ParentResponse {
            has_parent: parent.is_some(),
            parent: parent.map(IssueSummary::from),
        };
        let structured = serde_json::to_value(&response)?;

        let text = match &response.parent {
            None => format!("Issue {repo}#{number} has no parent issue."),
            Some(parent) => match format {
                OutputFormat::Human => {
                    format!(
                        "Parent of {repo}#{number}:\n- {}",
                        render_issue_line(parent)
                    )
                }
                OutputFormat::Structured => serde_json::to_string_pretty(&structured)?,
            },
        };

        Ok(ToolOutput {
            text: enforce_size_cap(text),
            structured: Some(structured),
        })
    }

    /// List the sub-issues of an issue, in priority order.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or a failed remote call.
    pub async fn list_sub_issues(&self, params: ListParams) -> Result<ToolOutput> {
        let (repo, number, page, format) = params.validate()?;
        let full = self.store.sub_issues(&repo, number).await?;
        list_output(ListKind::SubIssues, &repo, number, full, page, format)
    }

    /// Attach a sub-issue to a parent.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments, or a conflict when the
    /// child already has a parent and `replace_parent` is false.
    pub async fn add_sub_issue(&self, params: AddSubIssueParams) -> Result<ToolOutput> {
        let (repo, number, child_id, replace_parent) = params.validate()?;
        self.store
            .add_sub_issue(&repo, number, child_id, replace_parent)
            .await?;
        Ok(confirmation(format!(
            "Issue {child_id} is now a sub-issue of {repo}#{number}."
        )))
    }

    /// Detach a sub-issue from its parent.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid arguments or when the issue is not a
    /// child of that parent.
    pub async fn remove_sub_issue(&self, params: RemoveSubIssueParams) -> Result<ToolOutput> {
        let (repo, number, child_id) = params.validate()?;
        self.store.remove_sub_issue(&repo, number, child_id).await?;
        Ok(confirmation(format!(
            "Issue {child_id} is no longer a sub-issue of {repo}#{number}."
        )))
    }

    /// Move a sub-issue within its siblings.
    ///
    /// # Errors
    ///
    /// Returns an error when the positioning arguments are not exactly
    /// one of after/before (without reaching the store), or when the
    /// store rejects the move.
    pub async fn reprioritize_sub_issue(&self, params: ReprioritizeParams) -> Result<ToolOutput> {
        let (repo, number, child_id, placement) = params.validate()?;
        self.store
            .reprioritize_sub_issue(&repo, number, child_id, placement)
            .await?;

        let position = match placement {
            trellis_github::Placement::After(anchor) => format!("after issue {anchor}"),
            trellis_github::Placement::Before(anchor) => format!("before issue {anchor}"),
        };
        Ok(confirmation(format!(
            "Sub-issue {child_id} of {repo}#{number} moved {position}."
        )))
    }
}

/// Write-operation output: one confirmation sentence, no structured
/// payload.
fn confirmation(text: String) -> ToolOutput {
    ToolOutput {
        text,
        structured: None,
    }
}

/// Shared shaping for the three list tools.
///
/// The zero-result shortcut keys off the *full* result set, not the
/// requested page: an empty page of a non-empty set still renders
/// normally.
fn list_output(
    kind: ListKind,
    repo: &RepoRef,
    number: u64,
    full: Vec<IssueRef>,
    request: PageRequest,
    format: OutputFormat,
) -> Result<ToolOutput> {
    let all: Vec<IssueSummary> = full.into_iter().map(Into::into).collect();
    let (issues, page) = paginate(&all, request);
    let response = IssueListResponse { issues, page };
    let structured = serde_json::to_value(&response)?;

    let text = if response.page.total == 0 {
        kind.empty_sentence(repo, number)
    } else {
        match format {
            OutputFormat::Human => render_issue_list(
                &kind.heading(repo, number),
                &response.issues,
                &response.page,
                kind.numbered(),
            ),
            OutputFormat::Structured => serde_json::to_string_pretty(&structured)?,
        }
    };

    Ok(ToolOutput {
        text: enforce_size_cap(text),
        structured: Some(structured),
    })
}
