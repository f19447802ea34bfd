//! Error type for `grove-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] grove_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("group not found: {0}")]
  GroupNotFound(String),

  /// A bind would overwrite an existing parent.
  #[error("group {0} already has a parent")]
  ParentAssigned(String),

  #[error("group {group} is not a child of {parent}")]
  ParentMismatch { group: String, parent: String },

  /// A bind would make a group its own ancestor.
  #[error("group {0} is an ancestor of the new parent")]
  HierarchyCycle(String),

  /// A filter with no fields set would match every tuple.
  #[error("refusing to delete policies with an empty filter")]
  EmptyPolicyFilter,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
