//! The backend seam for issue relationship operations.

use crate::error::Result;
use crate::types::{IssueRef, RepoRef};
use async_trait::async_trait;

/// Where a repositioned sub-issue lands relative to a sibling.
///
/// Exactly one sibling anchor is carried; enforcing "exactly one of
/// after/before" on raw tool input is the caller's job, and by the time a
/// request reaches a backend the choice is already made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Place the sub-issue directly after the sibling with this global id.
    After(u64),

    /// Place the sub-issue directly before the sibling with this global id.
    Before(u64),
}

/// Backend interface for issue relationship operations.
///
/// Implementations must be `Send + Sync`; every method is a stateless
/// round trip against the backing service and returns fresh data.
///
/// # Method Categories
///
/// - **Blocking edges**: `blocked_by`, `blocking`, `add_blocked_by`,
///   `remove_blocked_by`
/// - **Parent/child edges**: `parent_of`, `sub_issues`, `add_sub_issue`,
///   `remove_sub_issue`, `reprioritize_sub_issue`
///
/// # Error Handling
///
/// All methods return [`Result`] with the classified error taxonomy from
/// [`crate::error::Error`]. The single deliberate error-to-data
/// translation in this interface is `parent_of`: an issue without a
/// parent is `Ok(None)`, never an error, even though the remote call
/// underneath signals not-found.
#[async_trait]
pub trait RelationStore: Send + Sync {
    // ========== Blocking edges ==========

    /// List the issues blocking `number`, in server order.
    ///
    /// Returns the complete set; an issue with no blockers yields an
    /// empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue does not exist, or any
    /// classified remote failure.
    async fn blocked_by(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>>;

    /// List the issues that `number` blocks, in server order.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue does not exist, or any
    /// classified remote failure.
    async fn blocking(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>>;

    /// Record that issue `blocking_id` (global id) blocks `number`.
    ///
    /// # Errors
    ///
    /// Fails if either issue is missing or the edge already exists.
    async fn add_blocked_by(&self, repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()>;

    /// Remove the blocking edge from `blocking_id` (global id) to `number`.
    ///
    /// # Errors
    ///
    /// Fails if the edge does not exist.
    async fn remove_blocked_by(&self, repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()>;

    // ========== Parent/child edges ==========

    /// Fetch the parent of `number`, or `None` when it has no parent.
    ///
    /// # Errors
    ///
    /// The remote not-found for "no parent" is normalized to `Ok(None)`;
    /// every other failure propagates.
    async fn parent_of(&self, repo: &RepoRef, number: u64) -> Result<Option<IssueRef>>;

    /// List the sub-issues of `number` in priority order.
    ///
    /// The order is server-determined and preserved as-is, never
    /// re-sorted.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue does not exist, or any
    /// classified remote failure.
    async fn sub_issues(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>>;

    /// Attach issue `sub_issue_id` (global id) as a child of `number`.
    ///
    /// # Errors
    ///
    /// Fails with `Error::Conflict`/`Error::Validation` if the child
    /// already has a parent and `replace_parent` is false.
    async fn add_sub_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        replace_parent: bool,
    ) -> Result<()>;

    /// Detach issue `sub_issue_id` (global id) from parent `number`.
    ///
    /// # Errors
    ///
    /// Fails if the issue is not currently a child of that parent.
    async fn remove_sub_issue(&self, repo: &RepoRef, number: u64, sub_issue_id: u64) -> Result<()>;

    /// Move sub-issue `sub_issue_id` within the children of `number`.
    ///
    /// # Errors
    ///
    /// Fails if the issue is not a child of that parent or the anchor
    /// sibling is missing.
    async fn reprioritize_sub_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        placement: Placement,
    ) -> Result<()>;
}
