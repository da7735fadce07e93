/// Task model
///
/// Tasks carry two independent flags, `is_urgent` and `is_important`, from
/// which the Eisenhower [`Quadrant`] is derived on every read. The quadrant is
/// never stored.
///
/// | urgent | important | quadrant          |
/// |--------|-----------|-------------------|
/// | true   | true      | 1 (Do First)      |
/// | false  | true      | 2 (Schedule)      |
/// | true   | false     | 3 (Delegate)      |
/// | false  | false     | 4 (Eliminate)     |
///
/// Status and priority are closed enums persisted as PostgreSQL enum types
/// with fixed snake_case labels; unknown labels are rejected, never coerced.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{double_option, Owned};

/// Workflow state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// How much the task matters to the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    MustHave,
    #[default]
    NiceToHave,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::MustHave => "must_have",
            TaskPriority::NiceToHave => "nice_to_have",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "must_have" => Ok(TaskPriority::MustHave),
            "nice_to_have" => Ok(TaskPriority::NiceToHave),
            other => Err(format!("Unknown task priority: {}", other)),
        }
    }
}

/// Eisenhower quadrant, serialized as its number 1-4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quadrant {
    /// Urgent and important
    DoFirst,
    /// Important, not urgent
    Schedule,
    /// Urgent, not important
    Delegate,
    /// Neither
    Eliminate,
}

impl Quadrant {
    pub fn from_flags(is_urgent: bool, is_important: bool) -> Self {
        match (is_urgent, is_important) {
            (true, true) => Quadrant::DoFirst,
            (false, true) => Quadrant::Schedule,
            (true, false) => Quadrant::Delegate,
            (false, false) => Quadrant::Eliminate,
        }
    }

    /// `(is_urgent, is_important)` for this quadrant
    pub fn flags(&self) -> (bool, bool) {
        match self {
            Quadrant::DoFirst => (true, true),
            Quadrant::Schedule => (false, true),
            Quadrant::Delegate => (true, false),
            Quadrant::Eliminate => (false, false),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Quadrant::DoFirst => 1,
            Quadrant::Schedule => 2,
            Quadrant::Delegate => 3,
            Quadrant::Eliminate => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::DoFirst => "Do First",
            Quadrant::Schedule => "Schedule",
            Quadrant::Delegate => "Delegate",
            Quadrant::Eliminate => "Eliminate",
        }
    }
}

impl TryFrom<u8> for Quadrant {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Quadrant::DoFirst),
            2 => Ok(Quadrant::Schedule),
            3 => Ok(Quadrant::Delegate),
            4 => Ok(Quadrant::Eliminate),
            other => Err(format!("Quadrant must be between 1 and 4, got {}", other)),
        }
    }
}

impl From<Quadrant> for u8 {
    fn from(q: Quadrant) -> Self {
        q.number()
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_urgent: bool,
    pub is_important: bool,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Derived classification
    pub fn quadrant(&self) -> Quadrant {
        Quadrant::from_flags(self.is_urgent, self.is_important)
    }

    /// Past its deadline and not done
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done && self.deadline.map(|d| d < now).unwrap_or(false)
    }
}

impl Owned for Task {
    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

// Written by hand so the quadrant is computed at every serialization
impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Task", 13)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("owner_id", &self.owner_id)?;
        s.serialize_field("project_id", &self.project_id)?;
        s.serialize_field("title", &self.title)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("is_urgent", &self.is_urgent)?;
        s.serialize_field("is_important", &self.is_important)?;
        s.serialize_field("status", &self.status)?;
        s.serialize_field("priority", &self.priority)?;
        s.serialize_field("deadline", &self.deadline)?;
        s.serialize_field("quadrant", &self.quadrant())?;
        s.serialize_field("created_at", &self.created_at)?;
        s.serialize_field("updated_at", &self.updated_at)?;
        s.end()
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTask {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 500, message = "must be 1 to 500 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[serde(default)]
    pub is_urgent: bool,

    #[serde(default)]
    pub is_important: bool,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Minimal task with defaults for everything but project and title
    pub fn new(project_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: None,
            is_urgent: false,
            is_important: false,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            deadline: None,
        }
    }

    pub fn with_flags(mut self, is_urgent: bool, is_important: bool) -> Self {
        self.is_urgent = is_urgent;
        self.is_important = is_important;
        self
    }
}

/// Partial update of a task
///
/// Nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TaskChanges {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 500, message = "must be 1 to 500 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub is_urgent: Option<bool>,
    pub is_important: Option<bool>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.is_urgent.is_none()
            && self.is_important.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.deadline.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(project_id) = self.project_id {
            task.project_id = project_id;
        }
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(urgent) = self.is_urgent {
            task.is_urgent = urgent;
        }
        if let Some(important) = self.is_important {
            task.is_important = important;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
    }
}

/// Conjunctive task filter; `None` fields do not constrain
///
/// A quadrant filter is ANDed with explicit flag filters, so a contradictory
/// combination matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub is_urgent: Option<bool>,
    pub is_important: Option<bool>,
    pub quadrant: Option<Quadrant>,
    pub search: Option<String>,
}

impl TaskFilter {
    /// Search term trimmed, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !TaskCountFilter::from(self).matches(task) {
            return false;
        }
        if self.priority.map_or(false, |p| p != task.priority) {
            return false;
        }
        if self.is_urgent.map_or(false, |u| u != task.is_urgent) {
            return false;
        }
        if self.is_important.map_or(false, |i| i != task.is_important) {
            return false;
        }
        if let Some(term) = self.search_term() {
            let needle = term.to_lowercase();
            if !super::contains_ci(Some(&task.title), &needle)
                && !super::contains_ci(task.description.as_deref(), &needle)
            {
                return false;
            }
        }
        true
    }
}

/// Filter subset supported for pagination totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCountFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub quadrant: Option<Quadrant>,
}

impl From<&TaskFilter> for TaskCountFilter {
    fn from(filter: &TaskFilter) -> Self {
        Self {
            project_id: filter.project_id,
            status: filter.status,
            quadrant: filter.quadrant,
        }
    }
}

impl TaskCountFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.map_or(true, |p| p == task.project_id)
            && self.status.map_or(true, |s| s == task.status)
            && self.quadrant.map_or(true, |q| q == task.quadrant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(is_urgent: bool, is_important: bool) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Buy milk".to_string(),
            description: Some("Semi-skimmed".to_string()),
            is_urgent,
            is_important,
            status: TaskStatus::Todo,
            priority: TaskPriority::NiceToHave,
            deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quadrant_table() {
        assert_eq!(task(true, true).quadrant().number(), 1);
        assert_eq!(task(false, true).quadrant().number(), 2);
        assert_eq!(task(true, false).quadrant().number(), 3);
        assert_eq!(task(false, false).quadrant().number(), 4);
    }

    #[test]
    fn test_quadrant_flags_inverse() {
        for n in 1..=4u8 {
            let q = Quadrant::try_from(n).unwrap();
            let (u, i) = q.flags();
            assert_eq!(Quadrant::from_flags(u, i), q);
        }
        assert!(Quadrant::try_from(0).is_err());
        assert!(Quadrant::try_from(5).is_err());
    }

    #[test]
    fn test_quadrant_depends_only_on_flags() {
        let mut a = task(true, false);
        let b = task(true, false);
        a.title = "Something else".to_string();
        a.status = TaskStatus::Done;
        a.priority = TaskPriority::MustHave;
        assert_eq!(a.quadrant(), b.quadrant());
    }

    #[test]
    fn test_serialized_task_carries_quadrant() {
        let json = serde_json::to_value(task(false, true)).unwrap();
        assert_eq!(json["quadrant"], 2);
        assert_eq!(json["status"], "todo");
        assert_eq!(json["priority"], "nice_to_have");
    }

    #[test]
    fn test_status_labels_reject_unknown() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::Blocked.to_string(), "blocked");
        assert!("IN_PROGRESS".parse::<TaskStatus>().is_err());
        assert!("archived".parse::<TaskStatus>().is_err());
        assert!(serde_json::from_str::<TaskStatus>("\"archived\"").is_err());

        assert_eq!("must_have".parse::<TaskPriority>().unwrap(), TaskPriority::MustHave);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_title_length() {
        let project = Uuid::new_v4();
        assert!(NewTask::new(project, "").validate().is_err());
        assert!(NewTask::new(project, "x".repeat(501)).validate().is_err());
        assert!(NewTask::new(project, "x".repeat(500)).validate().is_ok());
    }

    #[test]
    fn test_new_task_defaults_from_json() {
        let project = Uuid::new_v4();
        let raw = format!(r#"{{"project_id":"{}","title":"Write report"}}"#, project);
        let input: NewTask = serde_json::from_str(&raw).unwrap();
        assert_eq!(input.status, TaskStatus::Todo);
        assert_eq!(input.priority, TaskPriority::NiceToHave);
        assert!(!input.is_urgent && !input.is_important);
    }

    #[test]
    fn test_filter_conjunction() {
        let t = task(false, true);

        let by_quadrant = TaskFilter {
            quadrant: Some(Quadrant::Schedule),
            ..Default::default()
        };
        assert!(by_quadrant.matches(&t));

        let contradictory = TaskFilter {
            quadrant: Some(Quadrant::Schedule),
            is_urgent: Some(true),
            ..Default::default()
        };
        assert!(!contradictory.matches(&t));

        let search = TaskFilter {
            search: Some("  SKIMMED ".to_string()),
            ..Default::default()
        };
        assert!(search.matches(&t));

        let blank_search = TaskFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank_search.matches(&t));
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let mut t = task(true, true);
        assert!(!t.is_overdue(now));

        t.deadline = Some(now - chrono::Duration::hours(1));
        assert!(t.is_overdue(now));

        t.status = TaskStatus::Done;
        assert!(!t.is_overdue(now));
    }

    #[test]
    fn test_changes_apply() {
        let mut t = task(false, false);
        t.deadline = Some(Utc::now());
        let changes = TaskChanges {
            is_urgent: Some(true),
            deadline: Some(None),
            ..Default::default()
        };
        changes.apply_to(&mut t);
        assert!(t.is_urgent);
        assert!(t.deadline.is_none());
        assert_eq!(t.title, "Buy milk");
    }
}
