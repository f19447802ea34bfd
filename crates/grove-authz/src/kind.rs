//! Per-kind tuple construction.
//!
//! Each [`MemberKind`] has one strategy that knows the tuple shape used to
//! attach members of that kind to a group, where listing finds the groups a
//! member of that kind is related to, and how a group's members of that kind
//! are enumerated.

use grove_core::{
  group::Group,
  identity::Session,
  policy::{
    EntityType, ListQuery, MemberKind, Policy, PolicyReq, encode_domain_user_id,
    permission, relation,
  },
};

/// What assigning or unassigning members amounts to.
#[derive(Debug)]
pub(crate) enum Membership {
  /// Flat relation tuples, added or deleted as one set.
  Tuples(Vec<Policy>),
  /// A hierarchy change, carried out by the saga in `hierarchy`.
  Hierarchy { parent_id: String, child_ids: Vec<String> },
}

/// A policy-store listing, either towards subjects or towards objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
  Subjects(ListQuery),
  Objects(ListQuery),
}

/// Where the candidate set of a group listing comes from.
#[derive(Debug)]
pub(crate) enum CandidatePlan {
  /// Groups related to another entity, visible once `guard` passes.
  Related { guard: PolicyReq, source: Source },
  /// The groups the acting user reaches directly.
  Actor,
}

pub(crate) trait KindStrategy: Sync {
  fn membership(
    &self,
    domain: &str,
    group_id: &str,
    relation: &str,
    member_ids: &[String],
  ) -> Membership;

  fn candidates(&self, session: &Session, member_id: &str, permission: &str) -> CandidatePlan;

  /// Members of this kind in `group_id`, and the entity type they carry.
  /// `None` when the kind cannot be listed as members.
  fn members(&self, _group_id: &str, _permission: &str) -> Option<(Source, EntityType)> { None }
}

pub(crate) fn strategy(kind: MemberKind) -> &'static dyn KindStrategy {
  match kind {
    MemberKind::Device => &DeviceStrategy,
    MemberKind::Channel => &ChannelStrategy,
    MemberKind::Group => &GroupStrategy,
    MemberKind::User => &UserStrategy,
  }
}

/// A check of `permission` by the session's user on `object`.
pub(crate) fn user_req(
  session: &Session,
  permission: &str,
  object_type: EntityType,
  object: &str,
) -> PolicyReq {
  PolicyReq {
    domain: session.domain_id.clone(),
    subject_type: EntityType::User,
    subject: session.domain_user_id(),
    permission: permission.to_owned(),
    object_type,
    object: object.to_owned(),
  }
}

/// Tuples minted for a freshly created group: its creator administers it, its
/// domain owns it, and its parent (if any) contains it.
pub(crate) fn creation_policies(session: &Session, kind: MemberKind, group: &Group) -> Vec<Policy> {
  let domain = &session.domain_id;
  let mut policies = vec![
    Policy::new(
      domain,
      EntityType::User,
      session.domain_user_id(),
      relation::ADMINISTRATOR,
      EntityType::Group,
      &group.id,
    )
    .with_object_kind(kind),
    Policy::new(
      domain,
      EntityType::Domain,
      domain,
      relation::DOMAIN,
      EntityType::Group,
      &group.id,
    ),
  ];
  if let Some(parent) = group.parent_id() {
    policies.push(parent_policy(domain, parent, &group.id).with_object_kind(kind));
  }
  policies
}

/// The tuple recording that `parent_id` contains `child_id`.
pub(crate) fn parent_policy(domain: &str, parent_id: &str, child_id: &str) -> Policy {
  Policy::new(
    domain,
    EntityType::Group,
    parent_id,
    relation::PARENT_GROUP,
    EntityType::Group,
    child_id,
  )
}

// ─── Strategies ──────────────────────────────────────────────────────────────

/// Devices hang off a channel-shaped group: the group is the subject.
struct DeviceStrategy;

impl KindStrategy for DeviceStrategy {
  fn membership(
    &self,
    domain: &str,
    group_id: &str,
    relation: &str,
    member_ids: &[String],
  ) -> Membership {
    Membership::Tuples(
      member_ids
        .iter()
        .map(|device| {
          Policy::new(domain, EntityType::Group, group_id, relation, EntityType::Device, device)
            .with_subject_kind(MemberKind::Channel)
        })
        .collect(),
    )
  }

  fn candidates(&self, session: &Session, member_id: &str, _permission: &str) -> CandidatePlan {
    CandidatePlan::Related {
      guard:  user_req(session, permission::VIEW, EntityType::Device, member_id),
      source: Source::Subjects(ListQuery {
        subject_type: EntityType::Group,
        subject:      None,
        permission:   relation::GROUP.to_owned(),
        object_type:  EntityType::Device,
        object:       Some(member_id.to_owned()),
      }),
    }
  }

  fn members(&self, group_id: &str, _permission: &str) -> Option<(Source, EntityType)> {
    Some((
      Source::Objects(ListQuery {
        subject_type: EntityType::Group,
        subject:      Some(group_id.to_owned()),
        permission:   relation::GROUP.to_owned(),
        object_type:  EntityType::Device,
        object:       None,
      }),
      EntityType::Device,
    ))
  }
}

/// Channels point at the group they join.
struct ChannelStrategy;

impl KindStrategy for ChannelStrategy {
  fn membership(
    &self,
    domain: &str,
    group_id: &str,
    relation: &str,
    member_ids: &[String],
  ) -> Membership {
    Membership::Tuples(
      member_ids
        .iter()
        .map(|channel| {
          Policy::new(domain, EntityType::Group, channel, relation, EntityType::Group, group_id)
        })
        .collect(),
    )
  }

  /// The groups that sit above the channel.
  fn candidates(&self, session: &Session, member_id: &str, _permission: &str) -> CandidatePlan {
    CandidatePlan::Related {
      guard:  user_req(session, permission::VIEW, EntityType::Group, member_id),
      source: Source::Subjects(ListQuery {
        subject_type: EntityType::Group,
        subject:      None,
        permission:   relation::PARENT_GROUP.to_owned(),
        object_type:  EntityType::Group,
        object:       Some(member_id.to_owned()),
      }),
    }
  }
}

/// Groups are never a flat relation: membership is the parent hierarchy.
struct GroupStrategy;

impl KindStrategy for GroupStrategy {
  fn membership(
    &self,
    _domain: &str,
    group_id: &str,
    _relation: &str,
    member_ids: &[String],
  ) -> Membership {
    Membership::Hierarchy {
      parent_id: group_id.to_owned(),
      child_ids: member_ids.to_vec(),
    }
  }

  /// The direct children of the group.
  fn candidates(&self, session: &Session, member_id: &str, permission: &str) -> CandidatePlan {
    CandidatePlan::Related {
      guard:  user_req(session, permission, EntityType::Group, member_id),
      source: Source::Objects(ListQuery {
        subject_type: EntityType::Group,
        subject:      Some(member_id.to_owned()),
        permission:   relation::PARENT_GROUP.to_owned(),
        object_type:  EntityType::Group,
        object:       None,
      }),
    }
  }
}

/// Users are written domain-qualified so the same user id can act in several
/// domains.
struct UserStrategy;

impl KindStrategy for UserStrategy {
  fn membership(
    &self,
    domain: &str,
    group_id: &str,
    relation: &str,
    member_ids: &[String],
  ) -> Membership {
    Membership::Tuples(
      member_ids
        .iter()
        .map(|user| {
          Policy::new(
            domain,
            EntityType::User,
            encode_domain_user_id(domain, user),
            relation,
            EntityType::Group,
            group_id,
          )
        })
        .collect(),
    )
  }

  /// Listing another user's groups takes domain administration.
  fn candidates(&self, session: &Session, member_id: &str, permission: &str) -> CandidatePlan {
    if member_id.is_empty() || member_id == session.user_id {
      return CandidatePlan::Actor;
    }
    CandidatePlan::Related {
      guard:  user_req(session, permission::ADMIN, EntityType::Domain, &session.domain_id),
      source: Source::Objects(ListQuery {
        subject_type: EntityType::User,
        subject:      Some(encode_domain_user_id(&session.domain_id, member_id)),
        permission:   permission.to_owned(),
        object_type:  EntityType::Group,
        object:       None,
      }),
    }
  }

  fn members(&self, group_id: &str, permission: &str) -> Option<(Source, EntityType)> {
    Some((
      Source::Subjects(ListQuery {
        subject_type: EntityType::User,
        subject:      None,
        permission:   permission.to_owned(),
        object_type:  EntityType::Group,
        object:       Some(group_id.to_owned()),
      }),
      EntityType::User,
    ))
  }
}
