use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Serialize
};

pub const MAIN_CATEGORY: &str = "Main";

/// Opaque task identifier. The server
/// emits integers; the client never
/// interprets the value, so both
/// numbers and strings are accepted
/// and it is always sent back as text.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
#[serde(
  from = "RawTaskId",
  into = "String"
)]
pub struct TaskId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTaskId {
  Number(i64),
  Text(String)
}

impl From<RawTaskId> for TaskId {
  fn from(raw: RawTaskId) -> Self {
    match raw {
      | RawTaskId::Number(n) => {
        Self(n.to_string())
      }
      | RawTaskId::Text(s) => Self(s)
    }
  }
}

impl From<TaskId> for String {
  fn from(id: TaskId) -> Self {
    id.0
  }
}

impl TaskId {
  pub fn new(
    value: impl Into<String>
  ) -> Self {
    Self(value.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for TaskId {
  fn from(value: &str) -> Self {
    Self(value.to_string())
  }
}

/// One of the three task collections.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum Bucket {
  Main,
  /// The "Awaragardi" holding area.
  SideA,
  /// The "Home" holding area.
  SideB
}

impl Bucket {
  pub const ALL: [Bucket; 3] = [
    Bucket::Main,
    Bucket::SideA,
    Bucket::SideB
  ];

  pub fn is_side(self) -> bool {
    !matches!(self, Bucket::Main)
  }

  pub fn label(self) -> &'static str {
    match self {
      | Bucket::Main => MAIN_CATEGORY,
      | Bucket::SideA => "Awaragardi",
      | Bucket::SideB => "Home"
    }
  }
}

impl fmt::Display for Bucket {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct UnknownBucket(pub String);

impl fmt::Display for UnknownBucket {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown bucket '{}' (expected \
       main, awaragardi or home)",
      self.0
    )
  }
}

impl std::error::Error
  for UnknownBucket
{
}

impl FromStr for Bucket {
  type Err = UnknownBucket;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "main" => Ok(Bucket::Main),
      | "awaragardi" | "side-a"
      | "a" => Ok(Bucket::SideA),
      | "home" | "side-b" | "b" => {
        Ok(Bucket::SideB)
      }
      | _ => {
        Err(UnknownBucket(
          s.to_string()
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:           TaskId,
  #[serde(default)]
  pub title:        String,
  #[serde(default)]
  pub category:     String,
  pub due_datetime: Option<String>,
  #[serde(default)]
  pub locked:       bool,
  pub fixed_pos:    Option<i64>,
  pub part_label:   Option<String>,
  #[serde(default)]
  pub in_main:      bool,
  #[serde(default)]
  pub is_gym:       bool,
  #[serde(default)]
  pub is_done:      bool,
  pub created_at:   Option<String>,
  pub updated_at:   Option<String>
}

/// The server reports purged tasks
/// either as full rows or as bare ids.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(untagged)]
pub enum ExpiredEntry {
  Task(Box<Task>),
  Id(TaskId)
}

impl ExpiredEntry {
  pub fn id(&self) -> &TaskId {
    match self {
      | ExpiredEntry::Task(task) => {
        &task.id
      }
      | ExpiredEntry::Id(id) => id
    }
  }
}

/// Authoritative state of all three
/// buckets. `main_list` is required so
/// that an error body never decodes as
/// an empty board.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct ListSnapshot {
  pub main_list:       Vec<Task>,
  #[serde(default)]
  pub awaragardi_list: Vec<Task>,
  #[serde(default)]
  pub home_list:       Vec<Task>,
  #[serde(default)]
  pub removed_expired:
    Vec<ExpiredEntry>
}

impl ListSnapshot {
  pub fn bucket(
    &self,
    bucket: Bucket
  ) -> &[Task] {
    match bucket {
      | Bucket::Main => &self.main_list,
      | Bucket::SideA => {
        &self.awaragardi_list
      }
      | Bucket::SideB => &self.home_list
    }
  }

  /// Bucket and position of a task.
  pub fn locate(
    &self,
    id: &TaskId
  ) -> Option<(Bucket, usize)> {
    Bucket::ALL.into_iter().find_map(
      |bucket| {
        self
          .bucket(bucket)
          .iter()
          .position(|t| &t.id == id)
          .map(|idx| (bucket, idx))
      }
    )
  }

  pub fn expired_count(&self) -> usize {
    self.removed_expired.len()
  }
}

/// Body of `POST /move`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct MoveRequest {
  pub task_id:      TaskId,
  pub new_index:    usize,
  pub new_category: String,
  pub locked:       bool
}

impl MoveRequest {
  pub fn into_main(
    task_id: TaskId,
    new_index: usize,
    locked: bool
  ) -> Self {
    Self {
      task_id,
      new_index,
      new_category: MAIN_CATEGORY
        .to_string(),
      locked
    }
  }
}

/// Form body of `POST /add`. The
/// server stores the task in its
/// category bank, outside Main.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct NewTask {
  pub title:    String,
  pub category: String,
  pub due_date: String,
  pub due_time: String
}

/// Partial update sent to
/// `POST /update/{id}`. Absent fields
/// are left untouched by the server;
/// `fixed_pos: Some(None)` is sent as
/// an explicit `null`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub locked:       Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub fixed_pos: Option<Option<i64>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_datetime: Option<String>
}

impl TaskPatch {
  pub fn unlock() -> Self {
    Self {
      locked: Some(false),
      fixed_pos: Some(None),
      ..Self::default()
    }
  }

  pub fn due(
    local_iso: impl Into<String>
  ) -> Self {
    Self {
      due_datetime: Some(
        local_iso.into()
      ),
      ..Self::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_accepts_numeric_ids_and_bare_expired_ids()
   {
    let raw = r#"{
      "main_list": [
        {"id": 7, "title": "Essay", "category": "College",
         "due_datetime": "2025-11-06T14:30:00", "locked": true,
         "fixed_pos": 0, "part_label": null, "is_done": false,
         "is_gym": false, "in_main": false,
         "created_at": "2025-11-01T09:00:00", "updated_at": null}
      ],
      "awaragardi_list": [],
      "home_list": [{"id": "h1", "title": "Laundry", "category": "Home"}],
      "removed_expired": [3, 4]
    }"#;

    let snap: ListSnapshot =
      serde_json::from_str(raw)
        .expect("decode snapshot");

    assert_eq!(
      snap.main_list[0].id,
      TaskId::new("7")
    );
    assert!(snap.main_list[0].locked);
    assert_eq!(
      snap.locate(&TaskId::new("h1")),
      Some((Bucket::SideB, 0))
    );
    assert_eq!(snap.expired_count(), 2);
    assert_eq!(
      snap.removed_expired[1].id(),
      &TaskId::new("4")
    );
  }

  #[test]
  fn default_snapshot_is_an_empty_board()
   {
    let snap = ListSnapshot::default();
    assert!(Bucket::ALL.into_iter().all(
      |bucket| snap.bucket(bucket).is_empty()
    ));
    assert_eq!(snap.expired_count(), 0);
  }

  #[test]
  fn error_body_is_not_a_snapshot() {
    let raw = r#"{"status": "error", "reason": "bad json"}"#;
    assert!(
      serde_json::from_str::<
        ListSnapshot
      >(raw)
      .is_err()
    );
  }

  #[test]
  fn unlock_patch_sends_explicit_null_position()
   {
    let body = serde_json::to_value(
      TaskPatch::unlock()
    )
    .expect("encode patch");
    assert_eq!(
      body,
      serde_json::json!({
        "locked": false,
        "fixed_pos": null
      })
    );
  }

  #[test]
  fn move_request_serializes_id_as_text()
   {
    let body = serde_json::to_value(
      MoveRequest::into_main(
        TaskId::new("T1"),
        0,
        false
      )
    )
    .expect("encode move");
    assert_eq!(
      body,
      serde_json::json!({
        "task_id": "T1",
        "new_index": 0,
        "new_category": "Main",
        "locked": false
      })
    );
  }

  #[test]
  fn bucket_names_parse_case_insensitively()
   {
    assert_eq!(
      "Main".parse::<Bucket>(),
      Ok(Bucket::Main)
    );
    assert_eq!(
      "awaragardi".parse::<Bucket>(),
      Ok(Bucket::SideA)
    );
    assert_eq!(
      "HOME".parse::<Bucket>(),
      Ok(Bucket::SideB)
    );
    assert!(
      "gym".parse::<Bucket>().is_err()
    );
  }
}
