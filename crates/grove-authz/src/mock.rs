//! In-memory stores with fault injection, for service tests.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use grove_core::{
  group::{Group, Page, PageMeta, Status},
  identity::{IdentityResolver, Session},
  policy::{
    EntityType, ListQuery, PermissionsReq, Policy, PolicyFilter, PolicyReq, permission, relation,
    user_id_in_domain,
  },
  store::{GroupStore, PolicyStore},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("injected failure: {0}")]
pub struct Fault(pub &'static str);

fn trip(flag: &AtomicBool) -> bool { flag.swap(false, Ordering::SeqCst) }

// ─── Groups ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryGroups {
  rows:           Mutex<Vec<Group>>,
  fail_bind:      AtomicBool,
  pub writes:     AtomicUsize,
  pub retrievals: AtomicUsize,
}

impl MemoryGroups {
  pub fn fail_next_bind(&self) { self.fail_bind.store(true, Ordering::SeqCst); }

  pub fn len(&self) -> usize { self.rows.lock().unwrap().len() }

  pub fn get(&self, id: &str) -> Option<Group> {
    self.rows.lock().unwrap().iter().find(|g| g.id == id).cloned()
  }

  pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  pub fn retrievals(&self) -> usize { self.retrievals.load(Ordering::SeqCst) }

  fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }
}

impl GroupStore for MemoryGroups {
  type Error = Fault;

  async fn save(&self, group: Group) -> Result<Group, Fault> {
    self.wrote();
    self.rows.lock().unwrap().push(group.clone());
    Ok(group)
  }

  async fn retrieve_by_id(&self, id: &str) -> Result<Option<Group>, Fault> { Ok(self.get(id)) }

  async fn retrieve_by_ids(&self, meta: &PageMeta, ids: &[String]) -> Result<Page, Fault> {
    self.retrievals.fetch_add(1, Ordering::SeqCst);
    if ids.is_empty() && meta.owner_id.is_none() {
      return Ok(Page::empty(meta.clone()));
    }
    let rows = self.rows.lock().unwrap();
    let matching: Vec<Group> = rows
      .iter()
      .filter(|g| ids.is_empty() || ids.contains(&g.id))
      .filter(|g| meta.status == Status::All || g.status == meta.status)
      .filter(|g| meta.owner_id.as_ref().is_none_or(|o| &g.domain == o))
      .filter(|g| meta.name.as_ref().is_none_or(|n| &g.name == n))
      .cloned()
      .collect();

    let total = matching.len() as u64;
    let groups = matching
      .into_iter()
      .skip(meta.offset as usize)
      .take(meta.limit.min(usize::MAX as u64) as usize)
      .collect();
    Ok(Page { meta: PageMeta { total, ..meta.clone() }, groups })
  }

  async fn update(&self, group: Group) -> Result<Option<Group>, Fault> {
    self.wrote();
    let mut rows = self.rows.lock().unwrap();
    let Some(row) = rows
      .iter_mut()
      .find(|g| g.id == group.id && g.status == Status::Enabled)
    else {
      return Ok(None);
    };
    if !group.name.is_empty() {
      row.name = group.name;
    }
    if !group.description.is_empty() {
      row.description = group.description;
    }
    if !group.metadata.is_empty() {
      row.metadata = group.metadata;
    }
    row.updated_at = group.updated_at;
    row.updated_by = group.updated_by;
    Ok(Some(row.clone()))
  }

  async fn change_status(&self, group: Group) -> Result<Option<Group>, Fault> {
    self.wrote();
    let mut rows = self.rows.lock().unwrap();
    let Some(row) = rows.iter_mut().find(|g| g.id == group.id) else {
      return Ok(None);
    };
    row.status = group.status;
    row.updated_at = group.updated_at;
    row.updated_by = group.updated_by;
    Ok(Some(row.clone()))
  }

  async fn delete(&self, id: &str) -> Result<bool, Fault> {
    self.wrote();
    let mut rows = self.rows.lock().unwrap();
    let before = rows.len();
    rows.retain(|g| g.id != id);
    for row in rows.iter_mut().filter(|g| g.parent.as_deref() == Some(id)) {
      row.parent = None;
    }
    Ok(rows.len() != before)
  }

  async fn assign_parent_group(&self, parent_id: &str, group_ids: &[String]) -> Result<(), Fault> {
    self.wrote();
    if trip(&self.fail_bind) {
      return Err(Fault("bind"));
    }
    let mut rows = self.rows.lock().unwrap();
    if rows.iter().any(|g| group_ids.contains(&g.id) && g.parent.is_some()) {
      return Err(Fault("group already has a parent"));
    }
    for row in rows.iter_mut().filter(|g| group_ids.contains(&g.id)) {
      row.parent = Some(parent_id.to_owned());
    }
    Ok(())
  }

  async fn unassign_parent_group(&self, parent_id: &str, group_ids: &[String]) -> Result<(), Fault> {
    self.wrote();
    if trip(&self.fail_bind) {
      return Err(Fault("unbind"));
    }
    let mut rows = self.rows.lock().unwrap();
    for row in rows.iter_mut().filter(|g| group_ids.contains(&g.id)) {
      if row.parent.as_deref() == Some(parent_id) {
        row.parent = None;
      }
    }
    Ok(())
  }
}

// ─── Policies ────────────────────────────────────────────────────────────────

/// Whether holding relation `held` gives permission `wanted`.
fn grants(held: &str, wanted: &str) -> bool {
  use permission::*;

  held == wanted
    || match held {
      relation::ADMINISTRATOR => true,
      relation::EDITOR => [EDIT, SHARE, VIEW, MEMBERSHIP].contains(&wanted),
      relation::VIEWER => [VIEW, MEMBERSHIP].contains(&wanted),
      relation::MEMBER => [VIEW, MEMBERSHIP].contains(&wanted),
      _ => false,
    }
}

/// Tuples are keyed like the sqlite table: kinds and domain are annotations.
fn same_tuple(a: &Policy, b: &Policy) -> bool {
  a.subject_type == b.subject_type
    && a.subject == b.subject
    && a.relation == b.relation
    && a.object_type == b.object_type
    && a.object == b.object
}

#[derive(Default)]
pub struct MemoryPolicies {
  tuples:                Mutex<Vec<Policy>>,
  fail_add:              AtomicBool,
  fail_delete:           AtomicBool,
  fail_list_permissions: AtomicBool,
}

impl MemoryPolicies {
  pub fn seed(&self, policy: Policy) { self.tuples.lock().unwrap().push(policy); }

  pub fn fail_next_add(&self) { self.fail_add.store(true, Ordering::SeqCst); }

  pub fn fail_next_delete(&self) { self.fail_delete.store(true, Ordering::SeqCst); }

  pub fn fail_next_list_permissions(&self) {
    self.fail_list_permissions.store(true, Ordering::SeqCst);
  }

  pub fn contains(&self, subject: &str, relation: &str, object: &str) -> bool {
    self
      .tuples
      .lock()
      .unwrap()
      .iter()
      .any(|p| p.subject == subject && p.relation == relation && p.object == object)
  }

  pub fn naming(&self, id: &str) -> usize {
    self
      .tuples
      .lock()
      .unwrap()
      .iter()
      .filter(|p| p.subject == id || p.object == id)
      .count()
  }

  fn platform_admin(tuples: &[Policy], domain: &str, subject: &str) -> bool {
    let user = user_id_in_domain(domain, subject);
    tuples.iter().any(|p| {
      p.subject_type == EntityType::User
        && (p.subject == subject || p.subject == user)
        && p.object_type == EntityType::Platform
        && grants(&p.relation, permission::ADMIN)
    })
  }
}

impl PolicyStore for MemoryPolicies {
  type Error = Fault;

  async fn check(&self, req: &PolicyReq) -> Result<bool, Fault> {
    let tuples = self.tuples.lock().unwrap();
    let direct = tuples.iter().any(|p| {
      p.subject_type == req.subject_type
        && p.subject == req.subject
        && p.object_type == req.object_type
        && p.object == req.object
        && grants(&p.relation, &req.permission)
    });
    Ok(direct || (req.subject_type == EntityType::User && Self::platform_admin(&tuples, &req.domain, &req.subject)))
  }

  async fn add_policies(&self, policies: &[Policy]) -> Result<(), Fault> {
    if trip(&self.fail_add) {
      return Err(Fault("add policies"));
    }
    let mut tuples = self.tuples.lock().unwrap();
    for policy in policies {
      if !tuples.iter().any(|t| same_tuple(t, policy)) {
        tuples.push(policy.clone());
      }
    }
    Ok(())
  }

  async fn delete_policies(&self, policies: &[Policy]) -> Result<(), Fault> {
    if trip(&self.fail_delete) {
      return Err(Fault("delete policies"));
    }
    self
      .tuples
      .lock()
      .unwrap()
      .retain(|t| !policies.iter().any(|p| same_tuple(t, p)));
    Ok(())
  }

  async fn delete_policy_filter(&self, filter: &PolicyFilter) -> Result<(), Fault> {
    if trip(&self.fail_delete) {
      return Err(Fault("delete policy filter"));
    }
    self.tuples.lock().unwrap().retain(|p| !filter.matches(p));
    Ok(())
  }

  async fn list_all_subjects(&self, query: &ListQuery) -> Result<Vec<String>, Fault> {
    Ok(
      self
        .tuples
        .lock()
        .unwrap()
        .iter()
        .filter(|p| {
          p.subject_type == query.subject_type
            && p.object_type == query.object_type
            && query.object.as_ref().is_none_or(|o| &p.object == o)
            && grants(&p.relation, &query.permission)
        })
        .map(|p| p.subject.clone())
        .collect(),
    )
  }

  async fn list_all_objects(&self, query: &ListQuery) -> Result<Vec<String>, Fault> {
    Ok(
      self
        .tuples
        .lock()
        .unwrap()
        .iter()
        .filter(|p| {
          p.subject_type == query.subject_type
            && p.object_type == query.object_type
            && query.subject.as_ref().is_none_or(|s| &p.subject == s)
            && grants(&p.relation, &query.permission)
        })
        .map(|p| p.object.clone())
        .collect(),
    )
  }

  async fn list_permissions(&self, req: &PermissionsReq) -> Result<Vec<String>, Fault> {
    if trip(&self.fail_list_permissions) {
      return Err(Fault("list permissions"));
    }
    let tuples = self.tuples.lock().unwrap();
    let held: Vec<&Policy> = tuples
      .iter()
      .filter(|p| {
        p.subject_type == req.subject_type
          && p.subject == req.subject
          && p.object_type == req.object_type
          && p.object == req.object
      })
      .collect();

    use permission::*;
    Ok(
      [ADMIN, DELETE, EDIT, SHARE, VIEW, MEMBERSHIP]
        .into_iter()
        .filter(|perm| held.iter().any(|p| grants(&p.relation, perm)))
        .map(str::to_owned)
        .collect(),
    )
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Resolves a fixed set of tokens.
#[derive(Default)]
pub struct StaticIdentity {
  sessions: HashMap<String, Session>,
}

impl StaticIdentity {
  pub fn with(mut self, token: &str, session: Session) -> Self {
    self.sessions.insert(token.to_owned(), session);
    self
  }
}

impl IdentityResolver for StaticIdentity {
  type Error = Fault;

  async fn identify(&self, token: &str) -> Result<Session, Fault> {
    self.sessions.get(token).cloned().ok_or(Fault("unknown token"))
  }
}
