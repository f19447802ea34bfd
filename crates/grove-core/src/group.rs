//! Group: a tree-structured resource container scoped to one domain.
//!
//! A group's place in the hierarchy is mirrored in two places: the `parent`
//! field persisted by a [`GroupStore`](crate::store::GroupStore) and a
//! `parent_group` tuple held by a
//! [`PolicyStore`](crate::store::PolicyStore).

use std::{
  collections::{HashMap, HashSet},
  str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Free-form, string-keyed group metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a group.
///
/// `All` is a query-only value used as a listing filter; it is never stored.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum Status {
  #[default]
  Enabled,
  Disabled,
  All,
}

impl Status {
  /// Whether the value may be persisted on a group.
  pub fn is_storable(self) -> bool { !matches!(self, Self::All) }
}

impl FromStr for Status {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "enabled" => Ok(Self::Enabled),
      "disabled" => Ok(Self::Disabled),
      "all" => Ok(Self::All),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

// ─── Group ───────────────────────────────────────────────────────────────────

/// A group record.
///
/// `level` and `path` are only meaningful in hierarchy listings: negative
/// levels point towards ancestors, positive ones towards descendants, zero is
/// the anchor itself. `children` and `permissions` are transient and never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id:          String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent:      Option<String>,
  pub domain:      String,
  pub name:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub metadata:    Metadata,
  #[serde(default)]
  pub status:      Status,
  #[serde(default)]
  pub level:       i64,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub path:        String,
  pub created_at:  DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at:  Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_by:  Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children:    Vec<Group>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub permissions: Vec<String>,
}

impl Group {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }

  /// The parent id, treating an empty string as "no parent".
  pub fn parent_id(&self) -> Option<&str> {
    self.parent.as_deref().filter(|p| !p.is_empty())
  }
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// Which way a hierarchy listing walks from its anchor group.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
  #[default]
  Ancestors,
  Descendants,
}

impl FromStr for Direction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ancestors" | "up" => Ok(Self::Ancestors),
      "descendants" | "down" => Ok(Self::Descendants),
      other => Err(Error::UnknownDirection(other.to_owned())),
    }
  }
}

/// Query descriptor shared by every paginated group listing, echoed back with
/// the resolved `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
  pub total:      u64,
  pub offset:     u64,
  pub limit:      u64,
  pub name:       Option<String>,
  /// Anchor group for hierarchy listings.
  pub id:         Option<String>,
  pub owner_id:   Option<String>,
  #[serde(default)]
  pub metadata:   Metadata,
  pub status:     Status,
  /// Permission the caller must hold on every listed group.
  pub permission: String,
  pub list_perms: bool,
  /// Maximum number of hierarchy steps from the anchor; zero is unbounded.
  pub level:      u64,
  pub direction:  Direction,
  /// Present the result as a parent/children tree instead of a flat list.
  pub tree:       bool,
}

impl Default for PageMeta {
  fn default() -> Self {
    Self {
      total:      0,
      offset:     0,
      limit:      10,
      name:       None,
      id:         None,
      owner_id:   None,
      metadata:   Metadata::new(),
      status:     Status::Enabled,
      permission: crate::policy::permission::VIEW.to_owned(),
      list_perms: false,
      level:      0,
      direction:  Direction::Ancestors,
      tree:       false,
    }
  }
}

impl PageMeta {
  /// A page without a practical size limit and without a status filter, for
  /// internal consistency reads.
  pub fn unbounded() -> Self {
    Self { limit: i64::MAX as u64, status: Status::All, ..Self::default() }
  }
}

/// A page of groups together with the metadata that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
  #[serde(flatten)]
  pub meta:   PageMeta,
  pub groups: Vec<Group>,
}

impl Page {
  /// A page with zero results for `meta`.
  pub fn empty(meta: PageMeta) -> Self {
    Self { meta: PageMeta { total: 0, ..meta }, groups: Vec::new() }
  }
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
  pub id:          String,
  #[serde(rename = "type")]
  pub entity_type: crate::policy::EntityType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersPage {
  pub total:   u64,
  pub offset:  u64,
  pub limit:   u64,
  pub members: Vec<Member>,
}

// ─── Tree presentation ───────────────────────────────────────────────────────

/// Arrange a flat page of groups into parent/children trees.
///
/// Only groups present in `groups` are attached as children; a group whose
/// parent is not part of the page becomes a root. Page order is kept for
/// roots and siblings.
pub fn build_tree(groups: Vec<Group>) -> Vec<Group> {
  let present: HashSet<String> = groups.iter().map(|g| g.id.clone()).collect();

  let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
  let mut roots = Vec::new();
  for group in &groups {
    match group.parent_id().filter(|p| present.contains(*p)) {
      Some(parent) => children_of
        .entry(parent.to_owned())
        .or_default()
        .push(group.id.clone()),
      None => roots.push(group.id.clone()),
    }
  }

  let mut by_id: HashMap<String, Group> =
    groups.into_iter().map(|g| (g.id.clone(), g)).collect();

  roots
    .iter()
    .filter_map(|id| attach(id, &mut by_id, &children_of))
    .collect()
}

fn attach(
  id: &str,
  by_id: &mut HashMap<String, Group>,
  children_of: &HashMap<String, Vec<String>>,
) -> Option<Group> {
  let mut group = by_id.remove(id)?;
  if let Some(children) = children_of.get(id) {
    group.children = children
      .iter()
      .filter_map(|child| attach(child, by_id, children_of))
      .collect();
  }
  Some(group)
}
