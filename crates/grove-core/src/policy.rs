//! Policy tuples and the vocabulary they are written in.
//!
//! A tuple states that `subject` (of `subject_type`) stands in `relation` to
//! `object` (of `object_type`) inside a domain. Tuples are the sole record of
//! who may do what to which object, and of which group sits under which
//! parent.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Relations written into tuples.
pub mod relation {
  pub const ADMINISTRATOR: &str = "administrator";
  pub const EDITOR: &str = "editor";
  pub const VIEWER: &str = "viewer";
  pub const MEMBER: &str = "member";
  pub const DOMAIN: &str = "domain";
  pub const PARENT_GROUP: &str = "parent_group";
  pub const GROUP: &str = "group";
}

/// Permissions evaluated against tuples.
pub mod permission {
  pub const ADMIN: &str = "admin";
  pub const DELETE: &str = "delete";
  pub const EDIT: &str = "edit";
  pub const VIEW: &str = "view";
  pub const SHARE: &str = "share";
  pub const MEMBERSHIP: &str = "membership";
}

// ─── Entity types and member kinds ──────────────────────────────────────────

/// The type of a tuple's subject or object.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::AsRefStr,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityType {
  Group,
  Device,
  User,
  Domain,
  Platform,
}

impl FromStr for EntityType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "group" => Ok(Self::Group),
      "device" => Ok(Self::Device),
      "user" => Ok(Self::User),
      "domain" => Ok(Self::Domain),
      "platform" => Ok(Self::Platform),
      other => Err(Error::UnknownEntityType(other.to_owned())),
    }
  }
}

/// Which category of principal a member id refers to.
///
/// Also used as the kind tag on tuples, e.g. to tell a channel-shaped group
/// subject from a plain group.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::AsRefStr,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberKind {
  #[serde(rename = "devices")]
  #[strum(serialize = "devices")]
  Device,
  #[serde(rename = "channels")]
  #[strum(serialize = "channels")]
  Channel,
  #[serde(rename = "groups")]
  #[strum(serialize = "groups")]
  Group,
  #[serde(rename = "users")]
  #[strum(serialize = "users")]
  User,
}

impl FromStr for MemberKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "devices" => Ok(Self::Device),
      "channels" => Ok(Self::Channel),
      "groups" => Ok(Self::Group),
      "users" => Ok(Self::User),
      other => Err(Error::UnknownMemberKind(other.to_owned())),
    }
  }
}

// ─── Tuples ──────────────────────────────────────────────────────────────────

/// One tuple in the policy store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
  pub domain:       String,
  pub subject_type: EntityType,
  pub subject_kind: Option<MemberKind>,
  pub subject:      String,
  pub relation:     String,
  pub object_type:  EntityType,
  pub object_kind:  Option<MemberKind>,
  pub object:       String,
}

impl Policy {
  pub fn new(
    domain: impl Into<String>,
    subject_type: EntityType,
    subject: impl Into<String>,
    relation: impl Into<String>,
    object_type: EntityType,
    object: impl Into<String>,
  ) -> Self {
    Self {
      domain: domain.into(),
      subject_type,
      subject_kind: None,
      subject: subject.into(),
      relation: relation.into(),
      object_type,
      object_kind: None,
      object: object.into(),
    }
  }

  pub fn with_subject_kind(mut self, kind: MemberKind) -> Self {
    self.subject_kind = Some(kind);
    self
  }

  pub fn with_object_kind(mut self, kind: MemberKind) -> Self {
    self.object_kind = Some(kind);
    self
  }
}

/// A partial tuple pattern; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilter {
  pub domain:       Option<String>,
  pub subject_type: Option<EntityType>,
  pub subject:      Option<String>,
  pub relation:     Option<String>,
  pub object_type:  Option<EntityType>,
  pub object:       Option<String>,
}

impl PolicyFilter {
  pub fn matches(&self, policy: &Policy) -> bool {
    fn field<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
      want.as_ref().is_none_or(|w| w == have)
    }

    field(&self.domain, &policy.domain)
      && field(&self.subject_type, &policy.subject_type)
      && field(&self.subject, &policy.subject)
      && field(&self.relation, &policy.relation)
      && field(&self.object_type, &policy.object_type)
      && field(&self.object, &policy.object)
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// "Does `subject` hold `permission` on `object`?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyReq {
  pub domain:       String,
  pub subject_type: EntityType,
  pub subject:      String,
  pub permission:   String,
  pub object_type:  EntityType,
  pub object:       String,
}

/// Lists the subjects (when `object` is set) or objects (when `subject` is
/// set) connected through `permission`.
///
/// `permission` may name a relation directly, e.g. `parent_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
  pub subject_type: EntityType,
  pub subject:      Option<String>,
  pub permission:   String,
  pub object_type:  EntityType,
  pub object:       Option<String>,
}

/// Lists every permission `subject` holds on `object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsReq {
  pub subject_type: EntityType,
  pub subject:      String,
  pub object_type:  EntityType,
  pub object:       String,
}

// ─── Domain-scoped user ids ─────────────────────────────────────────────────

/// Qualify `user_id` with the domain it acts in, as written into tuples.
///
/// Returns an empty string if either part is empty.
pub fn encode_domain_user_id(domain_id: &str, user_id: &str) -> String {
  if domain_id.is_empty() || user_id.is_empty() {
    return String::new();
  }
  format!("{domain_id}_{user_id}")
}

/// Split a domain-qualified user id into `(domain_id, user_id)`.
pub fn decode_domain_user_id(domain_user_id: &str) -> (&str, &str) {
  match domain_user_id.split_once('_') {
    Some((domain, user)) => (domain, user),
    None => (domain_user_id, ""),
  }
}

/// The user id behind `subject` when it is qualified with `domain_id`.
///
/// Anything else, including an unqualified id that happens to contain `_`, is
/// returned unchanged.
pub fn user_id_in_domain<'a>(domain_id: &str, subject: &'a str) -> &'a str {
  if domain_id.is_empty() {
    return subject;
  }
  subject
    .strip_prefix(domain_id)
    .and_then(|rest| rest.strip_prefix('_'))
    .filter(|user| !user.is_empty())
    .unwrap_or(subject)
}
