//! In-memory relationship backend.
//!
//! An ephemeral [`RelationStore`] holding all edges in RAM, used by tests
//! and fixtures. It enforces the same contracts as the live service
//! (conflict on re-parenting without the override flag, failures on
//! removing absent edges, sibling order maintained on reorder) so the
//! tool layer's error paths can be exercised without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::{Placement, RelationStore};
use crate::types::{IssueRef, RepoRef};

/// Ephemeral [`RelationStore`] backed by in-process maps.
///
/// Relationship state is keyed the way the remote service keys it: edges
/// anchor on an issue's display number within one repository, and refer
/// to the other endpoint by global id. A single `InMemoryRelations`
/// models one repository; tests do not need more.
#[derive(Debug, Default)]
pub struct InMemoryRelations {
    inner: Mutex<State>,
    calls: AtomicUsize,
}

#[derive(Debug, Default)]
struct State {
    /// Issues by global id.
    issues: HashMap<u64, IssueRef>,

    /// Display number -> global id.
    numbers: HashMap<u64, u64>,

    /// Blocked display number -> blocking global ids, in insertion order.
    blocked_by: BTreeMap<u64, Vec<u64>>,

    /// Parent display number -> child global ids, in priority order.
    children: BTreeMap<u64, Vec<u64>>,

    /// Child global id -> parent display number.
    parents: HashMap<u64, u64>,
}

impl State {
    fn resolve(&self, number: u64) -> Result<u64> {
        self.numbers
            .get(&number)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("issue #{number}")))
    }

    fn issue(&self, id: u64) -> Result<IssueRef> {
        self.issues
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("issue id {id}")))
    }
}

impl InMemoryRelations {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait-method invocations so far.
    ///
    /// Lets tests assert that validation failures never reach the store.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Register an issue so relationship operations can reference it.
    pub async fn insert_issue(&self, issue: IssueRef) {
        let mut state = self.inner.lock().await;
        state.numbers.insert(issue.number, issue.id);
        state.issues.insert(issue.id, issue);
    }

    /// Seed a blocking edge without going through validation.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint was not inserted first; fixtures are
    /// expected to register issues before wiring edges.
    pub async fn seed_blocked_by(&self, number: u64, blocking_id: u64) {
        let mut state = self.inner.lock().await;
        assert!(state.numbers.contains_key(&number), "unknown issue #{number}");
        assert!(
            state.issues.contains_key(&blocking_id),
            "unknown issue id {blocking_id}"
        );
        state.blocked_by.entry(number).or_default().push(blocking_id);
    }

    /// Seed a parent/child edge without going through validation.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint was not inserted first.
    pub async fn seed_sub_issue(&self, parent_number: u64, child_id: u64) {
        let mut state = self.inner.lock().await;
        assert!(
            state.numbers.contains_key(&parent_number),
            "unknown issue #{parent_number}"
        );
        assert!(
            state.issues.contains_key(&child_id),
            "unknown issue id {child_id}"
        );
        state.children.entry(parent_number).or_default().push(child_id);
        state.parents.insert(child_id, parent_number);
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelationStore for InMemoryRelations {
    async fn blocked_by(&self, _repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        self.record_call();
        let state = self.inner.lock().await;
        state.resolve(number)?;
        let ids = state.blocked_by.get(&number).cloned().unwrap_or_default();
        ids.iter().map(|id| state.issue(*id)).collect()
    }

    async fn blocking(&self, _repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        self.record_call();
        let state = self.inner.lock().await;
        let id = state.resolve(number)?;
        state
            .blocked_by
            .iter()
            .filter(|(_, blockers)| blockers.contains(&id))
            .map(|(blocked_number, _)| state.resolve(*blocked_number).and_then(|i| state.issue(i)))
            .collect()
    }

    async fn add_blocked_by(&self, _repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()> {
        self.record_call();
        let mut state = self.inner.lock().await;
        state.resolve(number)?;
        state.issue(blocking_id)?;

        let blockers = state.blocked_by.entry(number).or_default();
        if blockers.contains(&blocking_id) {
            return Err(Error::Validation(format!(
                "issue #{number} is already blocked by issue {blocking_id}"
            )));
        }
        blockers.push(blocking_id);
        Ok(())
    }

    async fn remove_blocked_by(&self, _repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()> {
        self.record_call();
        let mut state = self.inner.lock().await;
        state.resolve(number)?;

        let blockers = state.blocked_by.entry(number).or_default();
        let Some(idx) = blockers.iter().position(|id| *id == blocking_id) else {
            return Err(Error::NotFound(format!(
                "blocking dependency {blocking_id} on issue #{number}"
            )));
        };
        blockers.remove(idx);
        Ok(())
    }

    async fn parent_of(&self, _repo: &RepoRef, number: u64) -> Result<Option<IssueRef>> {
        self.record_call();
        let state = self.inner.lock().await;
        let id = state.resolve(number)?;
        match state.parents.get(&id) {
            Some(parent_number) => {
                let parent_id = state.resolve(*parent_number)?;
                Ok(Some(state.issue(parent_id)?))
            }
            None => Ok(None),
        }
    }

    async fn sub_issues(&self, _repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        self.record_call();
        let state = self.inner.lock().await;
        state.resolve(number)?;
        let ids = state.children.get(&number).cloned().unwrap_or_default();
        ids.iter().map(|id| state.issue(*id)).collect()
    }

    async fn add_sub_issue(
        &self,
        _repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        replace_parent: bool,
    ) -> Result<()> {
        self.record_call();
        let mut state = self.inner.lock().await;
        state.resolve(number)?;
        state.issue(sub_issue_id)?;

        if let Some(current) = state.parents.get(&sub_issue_id).copied() {
            if current == number {
                return Err(Error::Validation(format!(
                    "issue {sub_issue_id} is already a sub-issue of #{number}"
                )));
            }
            if !replace_parent {
                return Err(Error::Conflict(format!(
                    "issue {sub_issue_id} already has a parent (#{current}); \
                     pass replace_parent to move it"
                )));
            }
            if let Some(siblings) = state.children.get_mut(&current) {
                siblings.retain(|id| *id != sub_issue_id);
            }
        }

        state.children.entry(number).or_default().push(sub_issue_id);
        state.parents.insert(sub_issue_id, number);
        Ok(())
    }

    async fn remove_sub_issue(&self, _repo: &RepoRef, number: u64, sub_issue_id: u64) -> Result<()> {
        self.record_call();
        let mut state = self.inner.lock().await;
        state.resolve(number)?;

        let children = state.children.entry(number).or_default();
        let Some(idx) = children.iter().position(|id| *id == sub_issue_id) else {
            return Err(Error::NotFound(format!(
                "issue {sub_issue_id} is not a sub-issue of #{number}"
            )));
        };
        children.remove(idx);
        state.parents.remove(&sub_issue_id);
        Ok(())
    }

    async fn reprioritize_sub_issue(
        &self,
        _repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        placement: Placement,
    ) -> Result<()> {
        self.record_call();
        let mut state = self.inner.lock().await;
        state.resolve(number)?;

        let children = state.children.entry(number).or_default();
        let Some(from) = children.iter().position(|id| *id == sub_issue_id) else {
            return Err(Error::Validation(format!(
                "issue {sub_issue_id} is not a sub-issue of #{number}"
            )));
        };
        children.remove(from);

        let (anchor, after) = match placement {
            Placement::After(anchor) => (anchor, true),
            Placement::Before(anchor) => (anchor, false),
        };
        let Some(anchor_idx) = children.iter().position(|id| *id == anchor) else {
            // Restore the original order before failing.
            children.insert(from, sub_issue_id);
            return Err(Error::Validation(format!(
                "anchor issue {anchor} is not a sub-issue of #{number}"
            )));
        };

        let to = if after { anchor_idx + 1 } else { anchor_idx };
        children.insert(to, sub_issue_id);
        Ok(())
    }
}
