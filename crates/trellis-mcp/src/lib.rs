//! MCP server for GitHub issue relationships.
//!
//! This crate provides an MCP (Model Context Protocol) server that lets
//! AI assistants inspect and edit the relationships between GitHub
//! issues: blocking dependencies and sub-issue (parent/child) edges.
//!
//! # Architecture
//!
//! The server is three layers over one byte stream:
//!
//! - [`session`] - line-delimited JSON-RPC framing and correlation
//! - [`registry`] + [`tools`] - the tool surface: typed contracts,
//!   pagination, dual-format rendering, error shaping
//! - `trellis-github` - the relation client behind the
//!   [`trellis_github::RelationStore`] seam
//!
//! # Tools
//!
//! ## Blocking dependencies
//! - `get_blocked_by` - List the issues blocking an issue
//! - `get_blocking` - List the issues an issue blocks
//! - `add_blocking_dependency` - Create a blocking edge
//! - `remove_blocking_dependency` - Remove a blocking edge
//!
//! ## Sub-issues
//! - `get_parent_issue` - Fetch an issue's parent, if any
//! - `list_sub_issues` - List children in priority order
//! - `add_sub_issue` - Attach a child
//! - `remove_sub_issue` - Detach a child
//! - `reprioritize_sub_issue` - Move a child among its siblings

pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod server;
pub mod session;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::ToolRegistry;
pub use server::{serve_stdio, TrellisServer};
pub use session::{RequestHandler, Session, SessionError, SessionState};
