//! [`GroupStore`] for [`SqliteStore`].

use std::collections::HashSet;

use grove_core::{
  group::{Direction, Group, Page, PageMeta, Status},
  store::GroupStore,
};
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value};

use crate::{
  Error, Result, SqliteStore,
  encode::{GROUP_COLUMNS, RawGroup, encode_dt, encode_metadata, json_member},
};

// ─── Query compilation ───────────────────────────────────────────────────────

/// A group listing compiled to SQL with numbered placeholders.
#[derive(Debug)]
struct ListingSql {
  select:  String,
  count:   String,
  params:  Vec<Value>,
  /// Leading params shared with `count`; the rest are limit and offset.
  filters: usize,
  tree:    bool,
}

fn bind(params: &mut Vec<Value>, value: impl Into<Value>) -> String {
  params.push(value.into());
  format!("?{}", params.len())
}

fn compile(meta: &PageMeta, ids: &[String]) -> Result<ListingSql> {
  let mut params = Vec::new();

  let (with, from, tree) = match &meta.id {
    Some(anchor) => {
      let anchor = bind(&mut params, anchor.clone());
      let (step, bound) = match meta.direction {
        Direction::Ancestors => (
          "SELECT g.parent_id, t.level - 1, g.parent_id || '.' || t.path \
           FROM grove_groups g JOIN tree t ON g.id = t.id \
           WHERE g.parent_id IS NOT NULL",
          "t.level > 0 -",
        ),
        Direction::Descendants => (
          "SELECT g.id, t.level + 1, t.path || '.' || g.id \
           FROM grove_groups g JOIN tree t ON g.parent_id = t.id \
           WHERE 1 = 1",
          "t.level <",
        ),
      };
      let bound = match meta.level {
        0 => String::new(),
        level => format!(" AND {bound} {}", bind(&mut params, clamp(level))),
      };
      (
        format!(
          "WITH RECURSIVE tree(id, level, path) AS (\
             SELECT id, 0, id FROM grove_groups WHERE id = {anchor} \
             UNION ALL {step}{bound}) "
        ),
        "FROM grove_groups g JOIN tree t ON t.id = g.id",
        true,
      )
    }
    None => (String::new(), "FROM grove_groups g", false),
  };

  let mut conds = Vec::new();
  if !ids.is_empty() {
    // One JSON array parameter, however many ids the caller may see.
    let ids = bind(&mut params, serde_json::to_string(ids)?);
    conds.push(format!("g.id IN (SELECT value FROM json_each({ids}))"));
  }
  if let Some(name) = &meta.name {
    conds.push(format!("g.name = {}", bind(&mut params, name.clone())));
  }
  if meta.status != Status::All {
    conds.push(format!("g.status = {}", bind(&mut params, meta.status.as_ref().to_owned())));
  }
  if let Some(owner) = &meta.owner_id {
    conds.push(format!("g.domain_id = {}", bind(&mut params, owner.clone())));
  }
  for (key, value) in &meta.metadata {
    let path = bind(&mut params, format!("${}", json_member(key)));
    contains(&mut params, &path, value, 0, &mut conds);
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  let filters = params.len();

  let (columns, order) = if tree {
    (format!("{GROUP_COLUMNS}, t.level, t.path"), "t.level, g.created_at, g.rowid")
  } else {
    (GROUP_COLUMNS.to_owned(), "g.created_at, g.rowid")
  };
  let limit = bind(&mut params, clamp(meta.limit));
  let offset = bind(&mut params, clamp(meta.offset));

  Ok(ListingSql {
    select: format!(
      "{with}SELECT {columns} {from} {where_clause} ORDER BY {order} LIMIT {limit} OFFSET {offset}"
    ),
    count: format!("{with}SELECT COUNT(*) {from} {where_clause}"),
    params,
    filters,
    tree,
  })
}

/// Conditions under which the metadata value at JSON path `path` (an SQL
/// expression) contains `value`: objects match by key, arrays by element and
/// scalars by type and value.
fn contains(
  params: &mut Vec<Value>,
  path: &str,
  value: &serde_json::Value,
  depth: usize,
  conds: &mut Vec<String>,
) {
  use serde_json::Value as Json;

  let at = format!("g.metadata, {path}");
  match value {
    Json::Null => conds.push(format!("json_type({at}) = 'null'")),
    Json::Bool(b) => conds.push(format!("json_type({at}) = '{b}'")),
    Json::Number(n) => {
      let n = match n.as_i64() {
        Some(i) => bind(params, i),
        None => bind(params, n.as_f64().unwrap_or(f64::NAN)),
      };
      conds.push(format!("json_type({at}) IN ('integer', 'real') AND json_extract({at}) = {n}"));
    }
    Json::String(s) => {
      let s = bind(params, s.clone());
      conds.push(format!("json_type({at}) = 'text' AND json_extract({at}) = {s}"));
    }
    Json::Object(members) => {
      conds.push(format!("json_type({at}) = 'object'"));
      for (key, member) in members {
        let member_path = format!("({path} || {})", bind(params, json_member(key)));
        contains(params, &member_path, member, depth, conds);
      }
    }
    Json::Array(items) => {
      conds.push(format!("json_type({at}) = 'array'"));
      for item in items {
        let alias = format!("e{depth}");
        let mut inner = Vec::new();
        contains(params, &format!("{alias}.fullkey"), item, depth + 1, &mut inner);
        conds.push(format!(
          "EXISTS (SELECT 1 FROM json_each({at}) {alias} WHERE {})",
          inner.join(" AND ")
        ));
      }
    }
  }
}

fn clamp(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn select_group(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawGroup>> {
  conn
    .query_row(
      &format!("SELECT {GROUP_COLUMNS} FROM grove_groups g WHERE g.id = ?1"),
      [id],
      |row| RawGroup::from_row(row, false),
    )
    .optional()
}

// ─── GroupStore impl ─────────────────────────────────────────────────────────

impl GroupStore for SqliteStore {
  type Error = Error;

  async fn save(&self, group: Group) -> Result<Group> {
    let id = group.id.clone();
    let parent = group.parent_id().map(str::to_owned);
    let domain = group.domain.clone();
    let name = group.name.clone();
    let description = group.description.clone();
    let metadata = encode_metadata(&group.metadata)?;
    let status = group.status.as_ref().to_owned();
    let created_at = encode_dt(group.created_at);
    let updated_at = group.updated_at.map(encode_dt);
    let updated_by = group.updated_by.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO grove_groups (
             id, parent_id, domain_id, name, description, metadata,
             status, created_at, updated_at, updated_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          params![
            id,
            parent,
            domain,
            name,
            description,
            metadata,
            status,
            created_at,
            updated_at,
            updated_by,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(group)
  }

  async fn retrieve_by_id(&self, id: &str) -> Result<Option<Group>> {
    let id = id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(select_group(conn, &id)?))
      .await?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn retrieve_by_ids(&self, meta: &PageMeta, ids: &[String]) -> Result<Page> {
    if ids.is_empty() && meta.owner_id.is_none() {
      return Ok(Page::empty(meta.clone()));
    }

    let sql = compile(meta, ids)?;
    let (total, raws): (i64, Vec<RawGroup>) = self
      .conn
      .call(move |conn| {
        let total = conn.query_row(
          &sql.count,
          params_from_iter(&sql.params[..sql.filters]),
          |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&sql.select)?;
        let rows = stmt
          .query_map(params_from_iter(&sql.params), |row| RawGroup::from_row(row, sql.tree))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let groups = raws
      .into_iter()
      .map(RawGroup::into_group)
      .collect::<Result<Vec<_>>>()?;
    Ok(Page {
      meta: PageMeta { total: total.max(0) as u64, ..meta.clone() },
      groups,
    })
  }

  async fn update(&self, group: Group) -> Result<Option<Group>> {
    let id = group.id;
    let name = group.name;
    let description = group.description;
    let metadata = if group.metadata.is_empty() {
      None
    } else {
      Some(encode_metadata(&group.metadata)?)
    };
    let updated_at = group.updated_at.map(encode_dt);
    let updated_by = group.updated_by;

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE grove_groups SET
             name        = CASE WHEN ?2 = '' THEN name ELSE ?2 END,
             description = CASE WHEN ?3 = '' THEN description ELSE ?3 END,
             metadata    = COALESCE(?4, metadata),
             updated_at  = ?5,
             updated_by  = ?6
           WHERE id = ?1 AND status = 'enabled'",
          params![id, name, description, metadata, updated_at, updated_by],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_group(conn, &id)?)
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn change_status(&self, group: Group) -> Result<Option<Group>> {
    let id = group.id;
    let status = group.status.as_ref().to_owned();
    let updated_at = group.updated_at.map(encode_dt);
    let updated_by = group.updated_by;

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE grove_groups SET status = ?2, updated_at = ?3, updated_by = ?4 WHERE id = ?1",
          params![id, status, updated_at, updated_by],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_group(conn, &id)?)
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn delete(&self, id: &str) -> Result<bool> {
    let id = id.to_owned();
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM grove_groups WHERE id = ?1", [&id])? > 0))
      .await?;
    Ok(deleted)
  }

  async fn assign_parent_group(&self, parent_id: &str, group_ids: &[String]) -> Result<()> {
    let parent_id = parent_id.to_owned();
    let ids = group_ids.to_vec();

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in &ids {
          let parent: Option<Option<String>> = tx
            .query_row("SELECT parent_id FROM grove_groups WHERE id = ?1", [id], |r| r.get(0))
            .optional()?;
          match parent {
            None => return Ok(Err(Error::GroupNotFound(id.clone()))),
            Some(Some(_)) => return Ok(Err(Error::ParentAssigned(id.clone()))),
            Some(None) => {}
          }
        }

        let ancestors: HashSet<String> = tx
          .prepare(
            "WITH RECURSIVE up(id) AS (
               SELECT ?1
               UNION
               SELECT g.parent_id FROM grove_groups g JOIN up ON g.id = up.id
               WHERE g.parent_id IS NOT NULL
             )
             SELECT id FROM up",
          )?
          .query_map([&parent_id], |r| r.get(0))?
          .collect::<rusqlite::Result<_>>()?;
        if let Some(id) = ids.iter().find(|id| ancestors.contains(*id)) {
          return Ok(Err(Error::HierarchyCycle(id.clone())));
        }

        for id in &ids {
          tx.execute("UPDATE grove_groups SET parent_id = ?1 WHERE id = ?2", [&parent_id, id])?;
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    if let Err(e) = &outcome {
      tracing::debug!(error = %e, "parent assignment rejected");
    }
    outcome
  }

  async fn unassign_parent_group(&self, parent_id: &str, group_ids: &[String]) -> Result<()> {
    let parent_id = parent_id.to_owned();
    let ids = group_ids.to_vec();

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in &ids {
          let parent: Option<Option<String>> = tx
            .query_row("SELECT parent_id FROM grove_groups WHERE id = ?1", [id], |r| r.get(0))
            .optional()?;
          match parent {
            None => return Ok(Err(Error::GroupNotFound(id.clone()))),
            Some(Some(current)) if current != parent_id => {
              return Ok(Err(Error::ParentMismatch {
                group:  id.clone(),
                parent: parent_id.clone(),
              }));
            }
            Some(_) => {}
          }
        }

        for id in &ids {
          tx.execute(
            "UPDATE grove_groups SET parent_id = NULL WHERE id = ?1 AND parent_id = ?2",
            [id, &parent_id],
          )?;
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    if let Err(e) = &outcome {
      tracing::debug!(error = %e, "parent removal rejected");
    }
    outcome
  }
}
