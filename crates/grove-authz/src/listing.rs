//! Authorization-filtered listing.
//!
//! A listing intersects two sets of group ids: the candidates related to the
//! queried member and the groups the caller holds `page.permission` on. Only
//! the intersection is fetched from the group store.

use std::collections::HashSet;

use grove_core::{
  group::{Member, MembersPage, Page, PageMeta, build_tree},
  identity::{IdentityResolver, Session},
  policy::{EntityType, ListQuery, MemberKind, PolicyReq, permission},
  store::{GroupStore, PolicyStore},
};

use crate::{
  Error, GroupService, Result,
  kind::{self, CandidatePlan, Source},
  permissions,
};

/// Which groups a listing may return.
enum Scope {
  /// Exactly these ids (possibly none).
  Ids(Vec<String>),
  /// Every group of the caller's domain.
  Domain,
}

impl<G, P, I> GroupService<G, P, I>
where
  G: GroupStore,
  P: PolicyStore + 'static,
  I: IdentityResolver,
{
  /// List the groups related to `member_id` (of `member_kind`) that the caller
  /// holds `page.permission` on.
  ///
  /// An empty intersection yields an empty page, not an error.
  #[tracing::instrument(skip(self, token, page), fields(permission = %page.permission))]
  pub async fn list_groups(
    &self,
    token: &str,
    member_kind: MemberKind,
    member_id: &str,
    mut page: PageMeta,
  ) -> Result<Page> {
    let session = self.identify(token).await?;

    let scope = match kind::strategy(member_kind).candidates(&session, member_id, &page.permission) {
      CandidatePlan::Related { guard, source } => {
        self.authorize(guard).await?;
        let candidates = self.list_source(&source).await?;
        let allowed = self.allowed_group_ids(&session, &page.permission).await?;
        Scope::Ids(intersect(candidates, allowed))
      }
      CandidatePlan::Actor => {
        if self.is_super_admin(&session).await? {
          page.owner_id = Some(session.domain_id.clone());
          Scope::Domain
        } else {
          // Fails for everyone but domain admins once the domain is disabled.
          self
            .authorize(kind::user_req(
              &session,
              permission::MEMBERSHIP,
              EntityType::Domain,
              &session.domain_id,
            ))
            .await?;
          let allowed = self.allowed_group_ids(&session, &page.permission).await?;
          Scope::Ids(dedup(allowed))
        }
      }
    };

    let ids = match scope {
      Scope::Ids(ids) if ids.is_empty() => {
        tracing::debug!("no authorized groups, skipping group store");
        return Ok(Page::empty(page));
      }
      Scope::Ids(ids) => ids,
      Scope::Domain => Vec::new(),
    };

    let mut result = self
      .groups
      .retrieve_by_ids(&page, &ids)
      .await
      .map_err(Error::group_store)?;

    if page.list_perms && !result.groups.is_empty() {
      permissions::annotate(&self.policies, &session.domain_user_id(), &mut result.groups).await?;
    }

    if page.tree {
      result.groups = build_tree(result.groups);
    }
    Ok(result)
  }

  /// List the members of `member_kind` in `group_id`.
  ///
  /// Only devices and users can be listed this way.
  #[tracing::instrument(skip(self, token))]
  pub async fn list_members(
    &self,
    token: &str,
    group_id: &str,
    permission: &str,
    member_kind: MemberKind,
  ) -> Result<MembersPage> {
    let session = self.identify(token).await?;
    self
      .authorize(kind::user_req(&session, permission::VIEW, EntityType::Group, group_id))
      .await?;

    let (source, entity_type) = kind::strategy(member_kind)
      .members(group_id, permission)
      .ok_or(Error::InvalidMemberKind(member_kind))?;

    let members: Vec<Member> = self
      .list_source(&source)
      .await?
      .into_iter()
      .map(|id| Member { id, entity_type })
      .collect();

    let count = members.len() as u64;
    Ok(MembersPage { total: count, offset: 0, limit: count, members })
  }

  async fn list_source(&self, source: &Source) -> Result<Vec<String>> {
    match source {
      Source::Subjects(query) => self.policies.list_all_subjects(query).await,
      Source::Objects(query) => self.policies.list_all_objects(query).await,
    }
    .map_err(Error::policy_store)
  }

  /// Every group the caller holds `permission` on.
  async fn allowed_group_ids(&self, session: &Session, permission: &str) -> Result<Vec<String>> {
    let query = ListQuery {
      subject_type: EntityType::User,
      subject:      Some(session.domain_user_id()),
      permission:   permission.to_owned(),
      object_type:  EntityType::Group,
      object:       None,
    };
    self
      .policies
      .list_all_objects(&query)
      .await
      .map_err(Error::policy_store)
  }

  async fn is_super_admin(&self, session: &Session) -> Result<bool> {
    let req = PolicyReq {
      domain:       String::new(),
      subject_type: EntityType::User,
      subject:      session.user_id.clone(),
      permission:   permission::ADMIN.to_owned(),
      object_type:  EntityType::Platform,
      object:       self.platform_object.to_string(),
    };
    self.policies.check(&req).await.map_err(Error::policy_store)
  }
}

/// Candidates that are also allowed, in candidate order, without duplicates.
fn intersect(candidates: Vec<String>, allowed: Vec<String>) -> Vec<String> {
  let allowed: HashSet<String> = allowed.into_iter().collect();
  let mut seen = HashSet::new();
  candidates
    .into_iter()
    .filter(|id| allowed.contains(id) && seen.insert(id.clone()))
    .collect()
}

fn dedup(ids: Vec<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
