//! The `GroupStore` and `PolicyStore` traits.
//!
//! Both are implemented by storage backends (e.g. `grove-store-sqlite`). The
//! authorization service depends on these abstractions only. The two stores
//! share no transaction: every method is assumed atomic on its own and nothing
//! more.

use std::future::Future;

use crate::{
  group::{Group, Page, PageMeta},
  policy::{ListQuery, PermissionsReq, Policy, PolicyFilter, PolicyReq},
};

// ─── Groups ──────────────────────────────────────────────────────────────────

/// Persistence for group records.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait GroupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a new group and return it as persisted.
  fn save(
    &self,
    group: Group,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  /// Retrieve a group by id. Returns `None` if not found.
  fn retrieve_by_id<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// Retrieve the groups among `ids` that match `meta`'s filters.
  ///
  /// With no ids, only an `owner_id` filter widens the query to the whole
  /// domain; otherwise an empty page is returned.
  fn retrieve_by_ids<'a>(
    &'a self,
    meta: &'a PageMeta,
    ids: &'a [String],
  ) -> impl Future<Output = Result<Page, Self::Error>> + Send + 'a;

  /// Overwrite the provided name, description and metadata of an enabled
  /// group. Returns `None` if no enabled group has that id.
  fn update(
    &self,
    group: Group,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// Persist `group.status`, stamping `updated_at` / `updated_by`. Returns
  /// `None` if not found.
  fn change_status(
    &self,
    group: Group,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// Delete a group. Returns `false` if it did not exist.
  fn delete<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Set `parent_id` as the parent of every group in `group_ids`.
  ///
  /// Fails without changing anything if any of them already has a parent.
  fn assign_parent_group<'a>(
    &'a self,
    parent_id: &'a str,
    group_ids: &'a [String],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Clear the parent of every group in `group_ids`.
  ///
  /// Fails without changing anything if any of them has a different parent.
  fn unassign_parent_group<'a>(
    &'a self,
    parent_id: &'a str,
    group_ids: &'a [String],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Policies ────────────────────────────────────────────────────────────────

/// A relationship-tuple store with list, check, add and delete operations.
///
/// How permissions are derived from relations is the store's business.
pub trait PolicyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn check<'a>(
    &'a self,
    req: &'a PolicyReq,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Add all `policies` or none of them.
  fn add_policies<'a>(
    &'a self,
    policies: &'a [Policy],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete all `policies` or none of them.
  fn delete_policies<'a>(
    &'a self,
    policies: &'a [Policy],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete every tuple matching `filter`.
  fn delete_policy_filter<'a>(
    &'a self,
    filter: &'a PolicyFilter,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn list_all_subjects<'a>(
    &'a self,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn list_all_objects<'a>(
    &'a self,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn list_permissions<'a>(
    &'a self,
    req: &'a PermissionsReq,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
