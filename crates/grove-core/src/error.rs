//! Error types for `grove-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown member kind: {0:?}")]
  UnknownMemberKind(String),

  #[error("unknown entity type: {0:?}")]
  UnknownEntityType(String),

  #[error("unknown hierarchy direction: {0:?}")]
  UnknownDirection(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
