//! Identity resolution: turning a credential into an acting principal.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::policy::encode_domain_user_id;

/// The principal behind a request and the domain it acts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user_id:   String,
  pub domain_id: String,
}

impl Session {
  pub fn new(user_id: impl Into<String>, domain_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), domain_id: domain_id.into() }
  }

  /// The subject id this session is known by in domain-scoped tuples.
  pub fn domain_user_id(&self) -> String {
    encode_domain_user_id(&self.domain_id, &self.user_id)
  }
}

/// Converts a credential (token, session cookie, …) into a [`Session`].
pub trait IdentityResolver: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn identify<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + 'a;
}
