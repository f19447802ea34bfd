//! Hierarchical group authorization for Grove.
//!
//! [`GroupService`] keeps a [`GroupStore`](grove_core::store::GroupStore) and a
//! [`PolicyStore`](grove_core::store::PolicyStore) consistent with each other:
//! group CRUD, the parent/child hierarchy, member assignment and
//! authorization-filtered listing. Transport, request decoding and subscriber
//! setup are the caller's responsibility.
//!
//! ```rust,ignore
//! let settings = Settings::load(Some(Path::new("grove.toml")))?;
//! let svc = GroupService::new(groups, policies, identity, &settings);
//! let group = svc.create_group(token, MemberKind::Group, Group::new("plant-a")).await?;
//! ```

mod hierarchy;
mod kind;
mod listing;
mod permissions;
mod service;

pub mod error;
pub mod settings;

pub use error::{Error, ErrorKind, Result};
pub use service::GroupService;
pub use settings::Settings;

#[cfg(test)]
mod mock;
