//! Error type for `grove-authz`.
//!
//! Every variant is classified by [`Error::kind`], which is all a transport
//! layer needs to pick a status code.

use grove_core::policy::MemberKind;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Authentication,
  Authorization,
  Validation,
  NotFound,
  Conflict,
  /// A multi-store mutation failed and compensation failed too.
  Compensation,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("authentication failed: {0}")]
  Authentication(#[source] BoxError),

  #[error("identity is not bound to a domain")]
  DomainAuthorization,

  #[error("not authorized")]
  Authorization,

  #[error("failed to authorize parent group")]
  ParentUnauthorized(#[source] Box<Error>),

  #[error("invalid status")]
  InvalidStatus,

  #[error("invalid member kind: {0}")]
  InvalidMemberKind(MemberKind),

  #[error("no members given")]
  EmptyMembers,

  #[error("missing {0}")]
  MissingField(&'static str),

  #[error("invalid group ids")]
  InvalidGroupIds,

  #[error("group not found: {0}")]
  NotFound(String),

  #[error("group {0} already has a parent")]
  ParentAlreadyAssigned(String),

  #[error("group {group} does not have parent {parent}")]
  ParentMismatch { group: String, parent: String },

  #[error("status already assigned")]
  StatusAlreadyAssigned,

  #[error("failed to retrieve groups: {0}")]
  RetrieveGroups(#[source] Box<Error>),

  #[error("failed to add policies: {0}")]
  AddPolicies(#[source] Box<Error>),

  #[error("failed to delete policies: {0}")]
  DeletePolicies(#[source] Box<Error>),

  /// The original failure, plus the failure to undo what preceded it.
  #[error("{source}; rollback failed: {rollback}")]
  Rollback { source: Box<Error>, rollback: Box<Error> },

  #[error("group store error: {0}")]
  GroupStore(#[source] BoxError),

  #[error("policy store error: {0}")]
  PolicyStore(#[source] BoxError),

  #[error("permission lookup task failed: {0}")]
  Task(#[from] tokio::task::JoinError),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Authentication(_) => ErrorKind::Authentication,
      Error::DomainAuthorization
      | Error::Authorization
      | Error::ParentUnauthorized(_) => ErrorKind::Authorization,
      Error::InvalidStatus
      | Error::InvalidMemberKind(_)
      | Error::EmptyMembers
      | Error::MissingField(_)
      | Error::InvalidGroupIds => ErrorKind::Validation,
      Error::NotFound(_) => ErrorKind::NotFound,
      Error::ParentAlreadyAssigned(_)
      | Error::ParentMismatch { .. }
      | Error::StatusAlreadyAssigned => ErrorKind::Conflict,
      Error::Rollback { .. } => ErrorKind::Compensation,
      Error::RetrieveGroups(_)
      | Error::AddPolicies(_)
      | Error::DeletePolicies(_)
      | Error::GroupStore(_)
      | Error::PolicyStore(_)
      | Error::Task(_)
      | Error::Config(_) => ErrorKind::Internal,
    }
  }

  pub(crate) fn group_store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::GroupStore(Box::new(e))
  }

  pub(crate) fn policy_store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::PolicyStore(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
