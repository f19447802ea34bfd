//! Parent/child assignment across the group store and the policy store.
//!
//! The two stores share no transaction. A hierarchy change is therefore a
//! two-step saga: the tuple mutation is applied first, then the structural
//! mutation; if the latter fails the precomputed compensating tuple mutation
//! is applied. Compensation only runs on a definite store error. A caller that
//! drops the future mid-saga skips it, and nothing is persisted that would let
//! a crashed saga resume.

use grove_core::{
  group::{Group, PageMeta},
  policy::Policy,
  store::{GroupStore, PolicyStore},
};

use crate::{Error, Result, kind::parent_policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HierarchyOp {
  Assign,
  Unassign,
}

/// A set of tuples to add to or delete from the policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TupleMutation {
  Add(Vec<Policy>),
  Delete(Vec<Policy>),
}

impl TupleMutation {
  async fn apply<P: PolicyStore>(&self, policies: &P) -> Result<()> {
    match self {
      TupleMutation::Add(p) => policies.add_policies(p).await,
      TupleMutation::Delete(p) => policies.delete_policies(p).await,
    }
    .map_err(Error::policy_store)
  }
}

enum SagaState {
  Applying,
  Compensating { source: Error },
}

/// A validated hierarchy change with its forward and compensating tuple sets.
#[derive(Debug)]
pub(crate) struct HierarchySaga {
  op:           HierarchyOp,
  parent_id:    String,
  child_ids:    Vec<String>,
  forward:      TupleMutation,
  compensation: TupleMutation,
}

impl HierarchySaga {
  /// Check `children` (as currently persisted) against `op` and build both
  /// tuple sets. Any conflicting child rejects the whole batch.
  pub(crate) fn plan(
    op: HierarchyOp,
    domain: &str,
    parent_id: &str,
    children: &[Group],
  ) -> Result<Self> {
    if children.is_empty() {
      return Err(Error::InvalidGroupIds);
    }

    let mut tuples = Vec::with_capacity(children.len());
    // Unassign only restores tuples for children that were actually bound.
    let mut bound = Vec::new();
    for child in children {
      match (op, child.parent_id()) {
        (HierarchyOp::Assign, Some(_)) => {
          return Err(Error::ParentAlreadyAssigned(child.id.clone()));
        }
        (HierarchyOp::Unassign, Some(current)) if current != parent_id => {
          return Err(Error::ParentMismatch {
            group:  child.id.clone(),
            parent: parent_id.to_owned(),
          });
        }
        _ => {}
      }
      let tuple = parent_policy(domain, parent_id, &child.id);
      if child.parent_id() == Some(parent_id) {
        bound.push(tuple.clone());
      }
      tuples.push(tuple);
    }

    let (forward, compensation) = match op {
      HierarchyOp::Assign => (TupleMutation::Add(tuples.clone()), TupleMutation::Delete(tuples)),
      HierarchyOp::Unassign => (TupleMutation::Delete(tuples), TupleMutation::Add(bound)),
    };

    Ok(Self {
      op,
      parent_id: parent_id.to_owned(),
      child_ids: children.iter().map(|g| g.id.clone()).collect(),
      forward,
      compensation,
    })
  }

  /// Apply the tuple mutation, then the structural one, compensating the
  /// former if the latter fails.
  pub(crate) async fn run<G, P>(self, groups: &G, policies: &P) -> Result<()>
  where
    G: GroupStore,
    P: PolicyStore,
  {
    // Nothing to undo yet if this fails.
    self.forward.apply(policies).await?;

    let mut state = SagaState::Applying;
    loop {
      state = match state {
        SagaState::Applying => match self.structural(groups).await {
          Ok(()) => return Ok(()),
          Err(source) => SagaState::Compensating { source },
        },
        SagaState::Compensating { source } => {
          tracing::warn!(
            op = ?self.op,
            parent_id = %self.parent_id,
            error = %source,
            "group store rejected hierarchy change, compensating policies"
          );
          return match self.compensation.apply(policies).await {
            Ok(()) => Err(source),
            Err(rollback) => {
              tracing::error!(
                op = ?self.op,
                parent_id = %self.parent_id,
                error = %rollback,
                "hierarchy compensation failed, policies and groups diverge"
              );
              Err(Error::Rollback {
                source:   Box::new(source),
                rollback: Box::new(rollback),
              })
            }
          };
        }
      };
    }
  }

  async fn structural<G: GroupStore>(&self, groups: &G) -> Result<()> {
    match self.op {
      HierarchyOp::Assign => groups.assign_parent_group(&self.parent_id, &self.child_ids).await,
      HierarchyOp::Unassign => groups.unassign_parent_group(&self.parent_id, &self.child_ids).await,
    }
    .map_err(Error::group_store)
  }
}

/// Fetch `child_ids`, then plan and run the saga for `op`.
pub(crate) async fn change_parent<G, P>(
  groups: &G,
  policies: &P,
  op: HierarchyOp,
  domain: &str,
  parent_id: &str,
  child_ids: &[String],
) -> Result<()>
where
  G: GroupStore,
  P: PolicyStore,
{
  let page = groups
    .retrieve_by_ids(&PageMeta::unbounded(), child_ids)
    .await
    .map_err(|e| Error::RetrieveGroups(Box::new(Error::group_store(e))))?;

  let saga = HierarchySaga::plan(op, domain, parent_id, &page.groups)?;
  tracing::debug!(?op, parent_id, children = saga.child_ids.len(), "changing group parent");
  saga.run(groups, policies).await
}
