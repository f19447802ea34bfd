//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, metadata is a compact JSON object, and the
//! closed vocabularies are stored by their lowercase names.

use chrono::{DateTime, Utc};
use grove_core::group::{Group, Metadata, Status};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn encode_metadata(m: &Metadata) -> Result<String> { Ok(serde_json::to_string(m)?) }

pub fn decode_metadata(s: &str) -> Result<Metadata> { Ok(serde_json::from_str(s)?) }

/// A JSON path step selecting member `key` of an object, to append to a path.
pub fn json_member(key: &str) -> String {
  format!(".\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawGroup::from_row`], qualified with alias `g`.
pub const GROUP_COLUMNS: &str = "g.id, g.parent_id, g.domain_id, g.name, g.description, \
                                 g.metadata, g.status, g.created_at, g.updated_at, g.updated_by";

/// Raw values read directly from a `grove_groups` row, plus the hierarchy
/// columns of a tree query.
pub struct RawGroup {
  pub id:          String,
  pub parent_id:   Option<String>,
  pub domain_id:   String,
  pub name:        String,
  pub description: String,
  pub metadata:    String,
  pub status:      String,
  pub created_at:  String,
  pub updated_at:  Option<String>,
  pub updated_by:  Option<String>,
  pub level:       i64,
  pub path:        String,
}

impl RawGroup {
  /// Read [`GROUP_COLUMNS`]; `level` and `path` follow when `tree` is set.
  pub fn from_row(row: &rusqlite::Row<'_>, tree: bool) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      parent_id:   row.get(1)?,
      domain_id:   row.get(2)?,
      name:        row.get(3)?,
      description: row.get(4)?,
      metadata:    row.get(5)?,
      status:      row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
      updated_by:  row.get(9)?,
      level:       if tree { row.get(10)? } else { 0 },
      path:        if tree { row.get(11)? } else { String::new() },
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      id:          self.id,
      parent:      self.parent_id,
      domain:      self.domain_id,
      name:        self.name,
      description: self.description,
      metadata:    decode_metadata(&self.metadata)?,
      status:      self.status.parse::<Status>()?,
      level:       self.level,
      path:        self.path,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  self.updated_at.as_deref().map(decode_dt).transpose()?,
      updated_by:  self.updated_by,
      children:    Vec::new(),
      permissions: Vec::new(),
    })
  }
}
