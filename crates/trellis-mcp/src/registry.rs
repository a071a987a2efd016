//! The tool registry: an immutable name → {contract, handler} table.
//!
//! Built once at process start and shared by reference; there is no
//! mutable global. Tool-level failures (including an unrecognized tool
//! name) come back as results with the error flag set, never as
//! protocol errors and never as a crash.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use trellis_github::RelationStore;

use crate::error::{Error, Result};
use crate::models::{
    AddSubIssueParams, BlockingEdgeParams, GetParentParams, ListParams, RemoveSubIssueParams,
    ReprioritizeParams,
};
use crate::protocol::{CallToolResult, ToolAnnotations, ToolDescriptor};
use crate::tools::{ToolOutput, Tools};

/// Tool names, the registry's single source of truth.
pub mod names {
    /// List blocking issues.
    pub const GET_BLOCKED_BY: &str = "get_blocked_by";

    /// List blocked issues.
    pub const GET_BLOCKING: &str = "get_blocking";

    /// Create a blocking edge.
    pub const ADD_BLOCKING_DEPENDENCY: &str = "add_blocking_dependency";

    /// Remove a blocking edge.
    pub const REMOVE_BLOCKING_DEPENDENCY: &str = "remove_blocking_dependency";

    /// Fetch the parent of a sub-issue.
    pub const GET_PARENT_ISSUE: &str = "get_parent_issue";

    /// List sub-issues in priority order.
    pub const LIST_SUB_ISSUES: &str = "list_sub_issues";

    /// Attach a sub-issue.
    pub const ADD_SUB_ISSUE: &str = "add_sub_issue";

    /// Detach a sub-issue.
    pub const REMOVE_SUB_ISSUE: &str = "remove_sub_issue";

    /// Reorder a sub-issue among its siblings.
    pub const REPRIORITIZE_SUB_ISSUE: &str = "reprioritize_sub_issue";
}

/// Hints for read tools: read-only, idempotent, open-world.
const READ: ToolAnnotations = ToolAnnotations {
    read_only_hint: true,
    destructive_hint: false,
    idempotent_hint: true,
    open_world_hint: true,
};

/// Hints for edge-creating writes: additive, idempotent.
const ADDITIVE: ToolAnnotations = ToolAnnotations {
    read_only_hint: false,
    destructive_hint: false,
    idempotent_hint: true,
    open_world_hint: true,
};

/// Hints for edge removal: destructive, idempotent.
const REMOVAL: ToolAnnotations = ToolAnnotations {
    read_only_hint: false,
    destructive_hint: true,
    idempotent_hint: true,
    open_world_hint: true,
};

/// Hints for reordering: repeated relative moves can land differently,
/// so not idempotent.
const REORDER: ToolAnnotations = ToolAnnotations {
    read_only_hint: false,
    destructive_hint: false,
    idempotent_hint: false,
    open_world_hint: true,
};

/// Static contract of one tool.
struct ToolSpec {
    name: &'static str,
    description: &'static str,
    annotations: ToolAnnotations,
    schema: fn() -> Value,
}

/// The immutable tool table plus the handlers it dispatches to.
pub struct ToolRegistry {
    tools: Tools,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Build the registry over a relation store.
    #[must_use]
    pub fn new(store: Arc<dyn RelationStore>) -> Self {
        let specs = vec![
            ToolSpec {
                name: names::GET_BLOCKED_BY,
                description: "List the issues blocking an issue from being worked on. \
                              Results are paginated via limit/offset.",
                annotations: READ,
                schema: schema_of::<ListParams>,
            },
            ToolSpec {
                name: names::GET_BLOCKING,
                description: "List the issues that an issue is blocking. \
                              Results are paginated via limit/offset.",
                annotations: READ,
                schema: schema_of::<ListParams>,
            },
            ToolSpec {
                name: names::ADD_BLOCKING_DEPENDENCY,
                description: "Mark an issue as blocked by another issue. Takes the blocked \
                              issue's display number and the blocking issue's global id.",
                annotations: ADDITIVE,
                schema: schema_of::<BlockingEdgeParams>,
            },
            ToolSpec {
                name: names::REMOVE_BLOCKING_DEPENDENCY,
                description: "Remove a blocking dependency between two issues.",
                annotations: REMOVAL,
                schema: schema_of::<BlockingEdgeParams>,
            },
            ToolSpec {
                name: names::GET_PARENT_ISSUE,
                description: "Get the parent of a sub-issue, or report that it has none.",
                annotations: READ,
                schema: schema_of::<GetParentParams>,
            },
            ToolSpec {
                name: names::LIST_SUB_ISSUES,
                description: "List an issue's sub-issues in priority order. \
                              Results are paginated via limit/offset.",
                annotations: READ,
                schema: schema_of::<ListParams>,
            },
            ToolSpec {
                name: names::ADD_SUB_ISSUE,
                description: "Attach an issue as a sub-issue of a parent. Takes the parent's \
                              display number and the child's global id; set replace_parent to \
                              move a child that already has a parent.",
                annotations: ADDITIVE,
                schema: schema_of::<AddSubIssueParams>,
            },
            ToolSpec {
                name: names::REMOVE_SUB_ISSUE,
                description: "Detach a sub-issue from its parent.",
                annotations: REMOVAL,
                schema: schema_of::<RemoveSubIssueParams>,
            },
            ToolSpec {
                name: names::REPRIORITIZE_SUB_ISSUE,
                description: "Move a sub-issue within its siblings. Pass exactly one of \
                              after_id or before_id naming the anchor sibling's global id.",
                annotations: REORDER,
                schema: schema_of::<ReprioritizeParams>,
            },
        ];

        Self {
            tools: Tools::new(store),
            specs,
        }
    }

    /// The advertised tool surface.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.specs
            .iter()
            .map(|spec| ToolDescriptor {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                input_schema: (spec.schema)(),
                annotations: Some(spec.annotations),
            })
            .collect()
    }

    /// Invoke a tool by name.
    ///
    /// Always produces a result: failures of any kind (unknown name,
    /// invalid arguments, remote rejection) are tool-level errors.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        match self.dispatch(name, arguments).await {
            Ok(output) => {
                let mut result = CallToolResult::text(output.text);
                if let Some(structured) = output.structured {
                    result = result.with_structured(structured);
                }
                result
            }
            Err(e) => {
                debug!(tool = name, error = %e, "tool invocation failed");
                CallToolResult::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Option<Value>) -> Result<ToolOutput> {
        let args = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        match name {
            names::GET_BLOCKED_BY => self.tools.get_blocked_by(parse(args)?).await,
            names::GET_BLOCKING => self.tools.get_blocking(parse(args)?).await,
            names::ADD_BLOCKING_DEPENDENCY => {
                self.tools.add_blocking_dependency(parse(args)?).await
            }
            names::REMOVE_BLOCKING_DEPENDENCY => {
                self.tools.remove_blocking_dependency(parse(args)?).await
            }
            names::GET_PARENT_ISSUE => self.tools.get_parent_issue(parse(args)?).await,
            names::LIST_SUB_ISSUES => self.tools.list_sub_issues(parse(args)?).await,
            names::ADD_SUB_ISSUE => self.tools.add_sub_issue(parse(args)?).await,
            names::REMOVE_SUB_ISSUE => self.tools.remove_sub_issue(parse(args)?).await,
            names::REPRIORITIZE_SUB_ISSUE => {
                self.tools.reprioritize_sub_issue(parse(args)?).await
            }
            _ => Err(Error::UnknownTool(name.to_string())),
        }
    }
}

/// Decode an argument record against a tool's typed contract.
fn parse<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| Error::InvalidArguments(e.to_string()))
}

/// JSON Schema for a parameter type.
fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({ "type": "object" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_github::InMemoryRelations;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(InMemoryRelations::new()))
    }

    #[test]
    fn registry_lists_all_nine_tools() {
        let descriptors = registry().descriptors();
        let tool_names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();

        assert!(tool_names.contains(&names::GET_BLOCKED_BY));
        assert!(tool_names.contains(&names::GET_BLOCKING));
        assert!(tool_names.contains(&names::ADD_BLOCKING_DEPENDENCY));
        assert!(tool_names.contains(&names::REMOVE_BLOCKING_DEPENDENCY));
        assert!(tool_names.contains(&names::GET_PARENT_ISSUE));
        assert!(tool_names.contains(&names::LIST_SUB_ISSUES));
        assert!(tool_names.contains(&names::ADD_SUB_ISSUE));
        assert!(tool_names.contains(&names::REMOVE_SUB_ISSUE));
        assert!(tool_names.contains(&names::REPRIORITIZE_SUB_ISSUE));
        assert_eq!(descriptors.len(), 9);
    }

    #[test]
    fn every_descriptor_has_object_schema_and_annotations() {
        for descriptor in registry().descriptors() {
            assert_eq!(
                descriptor.input_schema["type"], "object",
                "{} schema should be an object",
                descriptor.name
            );
            assert!(
                descriptor.annotations.is_some(),
                "{} should carry annotations",
                descriptor.name
            );
        }
    }

    #[test]
    fn behavioral_hints_follow_the_contract() {
        let descriptors = registry().descriptors();
        let hints = |name: &str| -> ToolAnnotations {
            descriptors
                .iter()
                .find(|d| d.name == name)
                .and_then(|d| d.annotations)
                .unwrap()
        };

        assert!(hints(names::GET_BLOCKED_BY).read_only_hint);
        assert!(!hints(names::ADD_SUB_ISSUE).read_only_hint);
        assert!(!hints(names::ADD_SUB_ISSUE).destructive_hint);
        assert!(hints(names::REMOVE_SUB_ISSUE).destructive_hint);
        assert!(hints(names::REMOVE_SUB_ISSUE).idempotent_hint);
        assert!(!hints(names::REPRIORITIZE_SUB_ISSUE).idempotent_hint);
        for descriptor in &descriptors {
            assert!(descriptor.annotations.unwrap().open_world_hint);
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_level_error() {
        let result = registry().call("no_such_tool", None).await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("tool not found"));
    }

    #[tokio::test]
    async fn undecodable_arguments_are_a_tool_level_error() {
        let result = registry()
            .call(
                names::GET_BLOCKED_BY,
                Some(serde_json::json!({"owner": "o"})),
            )
            .await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn missing_arguments_object_is_a_tool_level_error() {
        let result = registry().call(names::GET_BLOCKED_BY, None).await;
        assert!(result.is_error);
    }
}
