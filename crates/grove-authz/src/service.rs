//! [`GroupService`]: group CRUD, status lifecycle and membership mutation.
//!
//! Listing lives in `listing`, the hierarchy saga in `hierarchy`.

use std::sync::Arc;

use chrono::Utc;
use grove_core::{
  group::{Group, Status},
  identity::{IdentityResolver, Session},
  policy::{EntityType, MemberKind, PermissionsReq, PolicyFilter, PolicyReq, permission},
  store::{GroupStore, PolicyStore},
};
use uuid::Uuid;

use crate::{
  Error, Result, Settings,
  hierarchy::{self, HierarchyOp},
  kind::{self, Membership},
};

// ─── Service ─────────────────────────────────────────────────────────────────

/// The group authorization service.
///
/// Holds no state of its own beyond handles to the stores; cloning is cheap.
pub struct GroupService<G, P, I> {
  pub(crate) groups:          Arc<G>,
  pub(crate) policies:        Arc<P>,
  pub(crate) identity:        Arc<I>,
  pub(crate) platform_object: Arc<str>,
}

impl<G, P, I> Clone for GroupService<G, P, I> {
  fn clone(&self) -> Self {
    Self {
      groups:          Arc::clone(&self.groups),
      policies:        Arc::clone(&self.policies),
      identity:        Arc::clone(&self.identity),
      platform_object: Arc::clone(&self.platform_object),
    }
  }
}

impl<G, P, I> GroupService<G, P, I>
where
  G: GroupStore,
  P: PolicyStore + 'static,
  I: IdentityResolver,
{
  pub fn new(groups: Arc<G>, policies: Arc<P>, identity: Arc<I>, settings: &Settings) -> Self {
    Self {
      groups,
      policies,
      identity,
      platform_object: Arc::from(settings.platform_object.as_str()),
    }
  }

  // ── CRUD ──────────────────────────────────────────────────────────────────

  /// Create `group` in the caller's domain.
  ///
  /// The group row is written before its tuples. If granting the tuples fails
  /// the row stays behind without an administrator; the error is returned.
  #[tracing::instrument(skip_all, fields(kind = %member_kind, name = %group.name))]
  pub async fn create_group(
    &self,
    token: &str,
    member_kind: MemberKind,
    mut group: Group,
  ) -> Result<Group> {
    let session = self.identify(token).await?;
    if !group.status.is_storable() {
      return Err(Error::InvalidStatus);
    }
    self
      .authorize(kind::user_req(
        &session,
        permission::MEMBERSHIP,
        EntityType::Domain,
        &session.domain_id,
      ))
      .await?;

    group.id = Uuid::new_v4().to_string();
    group.domain = session.domain_id.clone();
    group.parent = group.parent_id().map(str::to_owned);
    group.created_at = Utc::now();
    group.updated_at = None;
    group.updated_by = None;
    group.level = 0;
    group.path.clear();
    group.children.clear();
    group.permissions.clear();

    if let Some(parent) = group.parent_id() {
      self
        .authorize(kind::user_req(&session, permission::EDIT, EntityType::Group, parent))
        .await
        .map_err(|e| Error::ParentUnauthorized(Box::new(e)))?;
    }

    let group = self.groups.save(group).await.map_err(Error::group_store)?;

    let policies = kind::creation_policies(&session, member_kind, &group);
    if let Err(e) = self.policies.add_policies(&policies).await {
      tracing::warn!(group_id = %group.id, error = %e, "group saved but its policies were not granted");
      return Err(Error::AddPolicies(Box::new(Error::policy_store(e))));
    }

    tracing::debug!(group_id = %group.id, "group created");
    Ok(group)
  }

  #[tracing::instrument(skip(self, token))]
  pub async fn view_group(&self, token: &str, id: &str) -> Result<Group> {
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::VIEW, EntityType::Group, id))
      .await?;
    self.retrieve(id).await
  }

  /// Every permission the caller holds on the group. Holding none at all is an
  /// authorization failure.
  #[tracing::instrument(skip(self, token))]
  pub async fn view_group_permissions(&self, token: &str, id: &str) -> Result<Vec<String>> {
    let session = self.identify(token).await?;
    let permissions = self
      .policies
      .list_permissions(&group_permissions_req(&session.domain_user_id(), id))
      .await
      .map_err(Error::policy_store)?;
    if permissions.is_empty() {
      return Err(Error::Authorization);
    }
    Ok(permissions)
  }

  #[tracing::instrument(skip_all, fields(group_id = %group.id))]
  pub async fn update_group(&self, token: &str, mut group: Group) -> Result<Group> {
    if group.id.is_empty() {
      return Err(Error::MissingField("group id"));
    }
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::EDIT, EntityType::Group, &group.id))
      .await?;

    group.updated_at = Some(Utc::now());
    group.updated_by = Some(session.user_id);

    let id = group.id.clone();
    self
      .groups
      .update(group)
      .await
      .map_err(Error::group_store)?
      .ok_or(Error::NotFound(id))
  }

  #[tracing::instrument(skip(self, token))]
  pub async fn enable_group(&self, token: &str, id: &str) -> Result<Group> {
    self.change_status(token, id, Status::Enabled).await
  }

  #[tracing::instrument(skip(self, token))]
  pub async fn disable_group(&self, token: &str, id: &str) -> Result<Group> {
    self.change_status(token, id, Status::Disabled).await
  }

  /// Delete a group and every tuple naming it.
  ///
  /// Tuples go first so a retraction failure never leaves tuples pointing at
  /// a group row that no longer exists.
  #[tracing::instrument(skip(self, token))]
  pub async fn delete_group(&self, token: &str, id: &str) -> Result<()> {
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::DELETE, EntityType::Group, id))
      .await?;

    for filter in retraction_filters(id) {
      self
        .policies
        .delete_policy_filter(&filter)
        .await
        .map_err(|e| Error::DeletePolicies(Box::new(Error::policy_store(e))))?;
    }

    if !self.groups.delete(id).await.map_err(Error::group_store)? {
      return Err(Error::NotFound(id.to_owned()));
    }
    tracing::debug!(group_id = id, "group deleted");
    Ok(())
  }

  // ── Membership ────────────────────────────────────────────────────────────

  /// Attach members of `member_kind` to `group_id` under `relation`.
  ///
  /// Group members become children of `group_id`; `relation` is ignored for
  /// them.
  #[tracing::instrument(skip(self, token))]
  pub async fn assign(
    &self,
    token: &str,
    group_id: &str,
    relation: &str,
    member_kind: MemberKind,
    member_ids: &[String],
  ) -> Result<()> {
    let session = self.authorize_membership_change(token, group_id, member_ids).await?;

    match kind::strategy(member_kind).membership(&session.domain_id, group_id, relation, member_ids) {
      Membership::Tuples(policies) => self
        .policies
        .add_policies(&policies)
        .await
        .map_err(|e| Error::AddPolicies(Box::new(Error::policy_store(e)))),
      Membership::Hierarchy { parent_id, child_ids } => {
        hierarchy::change_parent(
          self.groups.as_ref(),
          self.policies.as_ref(),
          HierarchyOp::Assign,
          &session.domain_id,
          &parent_id,
          &child_ids,
        )
        .await
      }
    }
  }

  /// Detach members of `member_kind` from `group_id`.
  #[tracing::instrument(skip(self, token))]
  pub async fn unassign(
    &self,
    token: &str,
    group_id: &str,
    relation: &str,
    member_kind: MemberKind,
    member_ids: &[String],
  ) -> Result<()> {
    let session = self.authorize_membership_change(token, group_id, member_ids).await?;

    match kind::strategy(member_kind).membership(&session.domain_id, group_id, relation, member_ids) {
      Membership::Tuples(policies) => self
        .policies
        .delete_policies(&policies)
        .await
        .map_err(|e| Error::DeletePolicies(Box::new(Error::policy_store(e)))),
      Membership::Hierarchy { parent_id, child_ids } => {
        hierarchy::change_parent(
          self.groups.as_ref(),
          self.policies.as_ref(),
          HierarchyOp::Unassign,
          &session.domain_id,
          &parent_id,
          &child_ids,
        )
        .await
      }
    }
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn authorize_membership_change(
    &self,
    token: &str,
    group_id: &str,
    member_ids: &[String],
  ) -> Result<Session> {
    if member_ids.is_empty() {
      return Err(Error::EmptyMembers);
    }
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::EDIT, EntityType::Group, group_id))
      .await?;
    Ok(session)
  }

  async fn change_status(&self, token: &str, id: &str, status: Status) -> Result<Group> {
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::EDIT, EntityType::Group, id))
      .await?;

    let current = self.retrieve(id).await?;
    if current.status == status {
      return Err(Error::StatusAlreadyAssigned);
    }

    let group = Group {
      id: id.to_owned(),
      status,
      updated_at: Some(Utc::now()),
      updated_by: Some(session.user_id),
      ..Group::default()
    };
    self
      .groups
      .change_status(group)
      .await
      .map_err(Error::group_store)?
      .ok_or_else(|| Error::NotFound(id.to_owned()))
  }

  pub(crate) async fn retrieve(&self, id: &str) -> Result<Group> {
    self
      .groups
      .retrieve_by_id(id)
      .await
      .map_err(Error::group_store)?
      .ok_or_else(|| Error::NotFound(id.to_owned()))
  }

  /// Resolve `token`; sessions without a user or a domain are rejected.
  pub(crate) async fn identify(&self, token: &str) -> Result<Session> {
    let session = self
      .identity
      .identify(token)
      .await
      .map_err(|e| Error::Authentication(Box::new(e)))?;
    if session.user_id.is_empty() || session.domain_id.is_empty() {
      return Err(Error::DomainAuthorization);
    }
    Ok(session)
  }

  pub(crate) async fn authorize(&self, req: PolicyReq) -> Result<()> {
    let allowed = self.policies.check(&req).await.map_err(Error::policy_store)?;
    tracing::debug!(
      subject = %req.subject,
      permission = %req.permission,
      object_type = %req.object_type,
      object = %req.object,
      allowed,
      "authorization check"
    );
    if !allowed {
      return Err(Error::Authorization);
    }
    Ok(())
  }
}

pub(crate) fn group_permissions_req(subject: &str, group_id: &str) -> PermissionsReq {
  PermissionsReq {
    subject_type: EntityType::User,
    subject:      subject.to_owned(),
    object_type:  EntityType::Group,
    object:       group_id.to_owned(),
  }
}

/// Every tuple pattern that names group `id`, as subject or as object.
fn retraction_filters(id: &str) -> [PolicyFilter; 5] {
  let subject = |object_type| PolicyFilter {
    subject_type: Some(EntityType::Group),
    subject: Some(id.to_owned()),
    object_type: Some(object_type),
    ..PolicyFilter::default()
  };
  let object = |subject_type| PolicyFilter {
    subject_type: Some(subject_type),
    object_type: Some(EntityType::Group),
    object: Some(id.to_owned()),
    ..PolicyFilter::default()
  };

  [
    // Children and channel-shaped device links.
    subject(EntityType::Group),
    subject(EntityType::Device),
    // Parent and member-group links, the owning domain, user relations.
    object(EntityType::Group),
    object(EntityType::Domain),
    object(EntityType::User),
  ]
}
