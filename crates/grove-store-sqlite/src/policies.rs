//! [`PolicyStore`] for [`SqliteStore`]: a direct-relation evaluator.
//!
//! A tuple with relation `R` satisfies permission `P` when `R == P` or when
//! `relation_permissions` maps `R` to `P`. Nothing is derived transitively
//! through other tuples. A user holding `administrator` on a platform object
//! passes every check.

use std::collections::HashSet;

use grove_core::{
  policy::{
    ListQuery, PermissionsReq, Policy, PolicyFilter, PolicyReq, permission, user_id_in_domain,
  },
  store::PolicyStore,
};
use rusqlite::params;

use crate::{Error, Result, SqliteStore};

/// Permissions reported by `list_permissions`, in this order.
const PERMISSIONS: [&str; 6] = [
  permission::ADMIN,
  permission::DELETE,
  permission::EDIT,
  permission::SHARE,
  permission::VIEW,
  permission::MEMBERSHIP,
];

/// SQL predicate: the row's relation grants the permission bound at `?n`.
fn grants(n: usize) -> String {
  format!(
    "(relation = ?{n} OR relation IN \
     (SELECT relation FROM relation_permissions WHERE permission = ?{n}))"
  )
}

/// Column values of one `policies` row.
struct PolicyRow {
  domain:       String,
  subject_type: &'static str,
  subject_kind: Option<&'static str>,
  subject:      String,
  relation:     String,
  object_type:  &'static str,
  object_kind:  Option<&'static str>,
  object:       String,
}

impl From<&Policy> for PolicyRow {
  fn from(p: &Policy) -> Self {
    Self {
      domain:       p.domain.clone(),
      subject_type: p.subject_type.into(),
      subject_kind: p.subject_kind.map(Into::into),
      subject:      p.subject.clone(),
      relation:     p.relation.clone(),
      object_type:  p.object_type.into(),
      object_kind:  p.object_kind.map(Into::into),
      object:       p.object.clone(),
    }
  }
}

impl PolicyStore for SqliteStore {
  type Error = Error;

  async fn check(&self, req: &PolicyReq) -> Result<bool> {
    let subject_type: &'static str = req.subject_type.into();
    let object_type: &'static str = req.object_type.into();
    let subject = req.subject.clone();
    let user = user_id_in_domain(&req.domain, &req.subject).to_owned();
    let object = req.object.clone();
    let permission = req.permission.clone();

    let sql = format!(
      "SELECT EXISTS (
         SELECT 1 FROM policies
         WHERE subject_type = ?1 AND subject = ?2 AND object_type = ?3 AND object = ?4
           AND {}
       ) OR (?1 = 'user' AND EXISTS (
         SELECT 1 FROM policies
         WHERE subject_type = 'user' AND subject IN (?2, ?6)
           AND relation = 'administrator' AND object_type = 'platform'
       ))",
      grants(5)
    );

    let allowed = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &sql,
          params![subject_type, subject, object_type, object, permission, user],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(allowed)
  }

  async fn add_policies(&self, policies: &[Policy]) -> Result<()> {
    let rows: Vec<PolicyRow> = policies.iter().map(PolicyRow::from).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO policies (
               domain, subject_type, subject_kind, subject,
               relation, object_type, object_kind, object
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for r in &rows {
            stmt.execute(params![
              r.domain,
              r.subject_type,
              r.subject_kind,
              r.subject,
              r.relation,
              r.object_type,
              r.object_kind,
              r.object,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_policies(&self, policies: &[Policy]) -> Result<()> {
    let rows: Vec<PolicyRow> = policies.iter().map(PolicyRow::from).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "DELETE FROM policies
             WHERE subject_type = ?1 AND subject = ?2 AND relation = ?3
               AND object_type = ?4 AND object = ?5",
          )?;
          for r in &rows {
            stmt.execute(params![r.subject_type, r.subject, r.relation, r.object_type, r.object])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_policy_filter(&self, filter: &PolicyFilter) -> Result<()> {
    if *filter == PolicyFilter::default() {
      return Err(Error::EmptyPolicyFilter);
    }

    let domain = filter.domain.clone();
    let subject_type: Option<&'static str> = filter.subject_type.map(Into::into);
    let subject = filter.subject.clone();
    let relation = filter.relation.clone();
    let object_type: Option<&'static str> = filter.object_type.map(Into::into);
    let object = filter.object.clone();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM policies
           WHERE (?1 IS NULL OR domain = ?1)
             AND (?2 IS NULL OR subject_type = ?2)
             AND (?3 IS NULL OR subject = ?3)
             AND (?4 IS NULL OR relation = ?4)
             AND (?5 IS NULL OR object_type = ?5)
             AND (?6 IS NULL OR object = ?6)",
          params![domain, subject_type, subject, relation, object_type, object],
        )?)
      })
      .await?;
    tracing::debug!(deleted, "policies deleted by filter");
    Ok(())
  }

  async fn list_all_subjects(&self, query: &ListQuery) -> Result<Vec<String>> {
    let subject_type: &'static str = query.subject_type.into();
    let object_type: &'static str = query.object_type.into();
    let object = query.object.clone();
    let permission = query.permission.clone();

    let sql = format!(
      "SELECT subject FROM policies
       WHERE subject_type = ?1 AND object_type = ?2 AND (?3 IS NULL OR object = ?3) AND {}
       GROUP BY subject ORDER BY MIN(rowid)",
      grants(4)
    );

    let subjects = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![subject_type, object_type, object, permission], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(subjects)
  }

  async fn list_all_objects(&self, query: &ListQuery) -> Result<Vec<String>> {
    let subject_type: &'static str = query.subject_type.into();
    let object_type: &'static str = query.object_type.into();
    let subject = query.subject.clone();
    let permission = query.permission.clone();

    let sql = format!(
      "SELECT object FROM policies
       WHERE subject_type = ?1 AND object_type = ?2 AND (?3 IS NULL OR subject = ?3) AND {}
       GROUP BY object ORDER BY MIN(rowid)",
      grants(4)
    );

    let objects = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![subject_type, object_type, subject, permission], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(objects)
  }

  async fn list_permissions(&self, req: &PermissionsReq) -> Result<Vec<String>> {
    let subject_type: &'static str = req.subject_type.into();
    let object_type: &'static str = req.object_type.into();
    let subject = req.subject.clone();
    let object = req.object.clone();

    let held: HashSet<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rp.permission FROM policies p
           JOIN relation_permissions rp ON rp.relation = p.relation
           WHERE p.subject_type = ?1 AND p.subject = ?2 AND p.object_type = ?3 AND p.object = ?4
           UNION
           SELECT p.relation FROM policies p
           WHERE p.subject_type = ?1 AND p.subject = ?2 AND p.object_type = ?3 AND p.object = ?4",
        )?;
        let rows = stmt
          .query_map(params![subject_type, subject, object_type, object], |r| r.get(0))?
          .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      PERMISSIONS
        .into_iter()
        .filter(|p| held.contains(*p))
        .map(str::to_owned)
        .collect(),
    )
  }
}
