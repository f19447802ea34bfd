//! Concurrent permission annotation of a listed page.

use std::sync::Arc;

use grove_core::{group::Group, store::PolicyStore};
use tokio::task::JoinSet;

use crate::{Error, Result, service::group_permissions_req};

/// Fill in `permissions` on every group with what `subject` holds on it.
///
/// One lookup per group runs concurrently in a single task set. The first
/// failure aborts the lookups still in flight and is returned; groups are
/// only annotated in full or the call fails.
pub(crate) async fn annotate<P>(policies: &Arc<P>, subject: &str, groups: &mut [Group]) -> Result<()>
where
  P: PolicyStore + 'static,
{
  let mut tasks = JoinSet::new();
  for (idx, group) in groups.iter().enumerate() {
    let policies = Arc::clone(policies);
    let req = group_permissions_req(subject, &group.id);
    tasks.spawn(async move {
      policies
        .list_permissions(&req)
        .await
        .map(|permissions| (idx, permissions))
    });
  }

  let mut annotated = vec![None; groups.len()];
  while let Some(joined) = tasks.join_next().await {
    match joined? {
      Ok((idx, permissions)) => annotated[idx] = Some(permissions),
      Err(e) => {
        tasks.abort_all();
        return Err(Error::policy_store(e));
      }
    }
  }

  for (group, permissions) in groups.iter_mut().zip(annotated) {
    group.permissions = permissions.unwrap_or_default();
  }
  Ok(())
}
