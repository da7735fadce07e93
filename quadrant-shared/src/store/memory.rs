/// In-memory store
///
/// Keeps all rows behind a single `tokio::sync::RwLock`. Each mutating call
/// holds the write lock for its whole duration, which gives the same
/// all-or-nothing behaviour as a single SQL statement. The constraints the
/// PostgreSQL schema enforces are checked here too and reported with the same
/// constraint names:
///
/// - unique email and unique external id
/// - a user needs a password hash or an external id
/// - a task's project must belong to the task's owner
/// - deleting a project deletes its tasks
///
/// Rows are kept in insertion order and timestamps strictly increase, so
/// "creation order" is deterministic.
///
/// # Example
///
/// ```
/// use quadrant_shared::models::user::NewUser;
/// use quadrant_shared::store::{MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let user = store
///     .create_user(&NewUser {
///         email: "a@x.com".to_string(),
///         password_hash: Some("$argon2id$...".to_string()),
///         ..Default::default()
///     })
///     .await?;
/// assert!(store.find_user_by_email("a@x.com").await?.is_some());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::constraints::{TASKS_PROJECT_OWNER, USERS_CREDENTIAL, USERS_EMAIL, USERS_EXTERNAL_ID};
use super::{OwnedRepository, ProjectStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::project::{NewProject, Project, ProjectChanges};
use crate::models::task::{NewTask, Task, TaskChanges, TaskCountFilter, TaskFilter};
use crate::models::user::{NewUser, User, UserChanges};
use crate::models::{contains_ci, Owned, Page};

#[derive(Debug, Default)]
pub struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    last_stamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Current time, nudged forward so no two rows share a timestamp
    fn stamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now
    }

    fn project_owned_by(&self, project_id: Uuid, owner_id: Uuid) -> bool {
        self.projects
            .iter()
            .any(|p| p.id == project_id && p.owner_id == owner_id)
    }

    fn check_user_uniqueness(
        &self,
        skip_id: Option<Uuid>,
        email: Option<&str>,
        external_id: Option<&str>,
    ) -> StoreResult<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != skip_id);
        for other in others {
            if email.map_or(false, |e| other.email == e) {
                return Err(StoreError::UniqueViolation {
                    constraint: USERS_EMAIL.to_string(),
                });
            }
            if external_id.is_some() && other.external_id.as_deref() == external_id {
                return Err(StoreError::UniqueViolation {
                    constraint: USERS_EXTERNAL_ID.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Table access for entities served by the generic owner-scoped operations
pub trait MemoryTable: Owned + Clone + Send + Sync + 'static {
    fn rows(tables: &Tables) -> &Vec<Self>;
    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self>;

    /// Runs after a row is removed, inside the same write lock
    fn cascade(_tables: &mut Tables, _id: Uuid) {}
}

impl MemoryTable for Project {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.projects
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.projects
    }

    fn cascade(tables: &mut Tables, id: Uuid) {
        tables.tasks.retain(|t| t.project_id != id);
    }
}

impl MemoryTable for Task {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.tasks
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.tasks
    }
}

/// Process-local implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T> OwnedRepository<T> for MemoryStore
where
    T: MemoryTable,
{
    async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<T>> {
        let tables = self.tables.read().await;
        Ok(T::rows(&tables)
            .iter()
            .find(|row| row.id() == id && row.owner_id() == owner_id)
            .cloned())
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let rows = T::rows_mut(&mut tables);
        let before = rows.len();
        rows.retain(|row| !(row.id() == id && row.owner_id() == owner_id));
        let deleted = rows.len() < before;

        if deleted {
            T::cascade(&mut tables, id);
        }
        Ok(deleted)
    }
}

fn project_matches(project: &Project, owner_id: Uuid, needle: Option<&str>) -> bool {
    project.owner_id == owner_id
        && needle.map_or(true, |n| {
            contains_ci(Some(&project.name), n) || contains_ci(project.description.as_deref(), n)
        })
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn list_projects(
        &self,
        owner_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> StoreResult<Vec<Project>> {
        let needle = lowered_search(search);
        let tables = self.tables.read().await;
        let matching = tables
            .projects
            .iter()
            .filter(|p| project_matches(p, owner_id, needle.as_deref()))
            .cloned();
        Ok(page.apply(matching))
    }

    async fn count_projects(&self, owner_id: Uuid, search: Option<&str>) -> StoreResult<i64> {
        let needle = lowered_search(search);
        let tables = self.tables.read().await;
        let count = tables
            .projects
            .iter()
            .filter(|p| project_matches(p, owner_id, needle.as_deref()))
            .count();
        Ok(count as i64)
    }

    async fn create_project(&self, owner_id: Uuid, input: &NewProject) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "projects_owner_id_fkey".to_string(),
            });
        }

        let now = tables.stamp();
        let project = Project {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &ProjectChanges,
    ) -> StoreResult<Option<Project>> {
        let mut tables = self.tables.write().await;
        let now = tables.stamp();
        let Some(project) = tables
            .projects
            .iter_mut()
            .find(|p| p.id == id && p.owner_id == owner_id)
        else {
            return Ok(None);
        };

        changes.apply_to(project);
        project.updated_at = now;
        Ok(Some(project.clone()))
    }

    async fn count_project_tasks(&self, project_id: Uuid, owner_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id && t.owner_id == owner_id)
            .count();
        Ok(count as i64)
    }
}

fn lowered_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Owner's tasks, newest first
fn newest_first<'a>(tasks: &'a [Task], owner_id: Uuid) -> Vec<&'a Task> {
    let mut owned: Vec<&Task> = tasks.iter().rev().filter(|t| t.owner_id == owner_id).collect();
    owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    owned
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(
        &self,
        owner_id: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let matching = newest_first(&tables.tasks, owner_id)
            .into_iter()
            .filter(|t| filter.matches(t))
            .cloned();
        Ok(page.apply(matching))
    }

    async fn count_tasks(&self, owner_id: Uuid, filter: &TaskCountFilter) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .tasks
            .iter()
            .filter(|t| t.owner_id == owner_id && filter.matches(t))
            .count();
        Ok(count as i64)
    }

    async fn create_task(&self, owner_id: Uuid, input: &NewTask) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        if !tables.project_owned_by(input.project_id, owner_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: TASKS_PROJECT_OWNER.to_string(),
            });
        }

        let now = tables.stamp();
        let task = Task {
            id: Uuid::new_v4(),
            owner_id,
            project_id: input.project_id,
            title: input.title.clone(),
            description: input.description.clone(),
            is_urgent: input.is_urgent,
            is_important: input.is_important,
            status: input.status,
            priority: input.priority,
            deadline: input.deadline,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TaskChanges,
    ) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        if let Some(project_id) = changes.project_id {
            if !tables.project_owned_by(project_id, owner_id) {
                return Ok(None);
            }
        }

        let now = tables.stamp();
        let Some(task) = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner_id)
        else {
            return Ok(None);
        };

        changes.apply_to(task);
        task.updated_at = now;
        Ok(Some(task.clone()))
    }

    async fn list_overdue(&self, owner_id: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut overdue: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|t| t.owner_id == owner_id && t.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by_key(|t| t.deadline);
        Ok(overdue)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        if input.password_hash.is_none() && input.external_id.is_none() {
            return Err(StoreError::CheckViolation {
                constraint: USERS_CREDENTIAL.to_string(),
            });
        }

        let mut tables = self.tables.write().await;
        tables.check_user_uniqueness(None, Some(&input.email), input.external_id.as_deref())?;

        let now = tables.stamp();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email.clone(),
            password_hash: input.password_hash.clone(),
            full_name: input.full_name.clone(),
            is_active: true,
            is_verified: input.is_verified,
            external_id: input.external_id.clone(),
            avatar_url: input.avatar_url.clone(),
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        tables.check_user_uniqueness(
            Some(id),
            changes.email.as_deref(),
            changes.external_id.as_deref(),
        )?;

        let now = tables.stamp();
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        let mut updated = user.clone();
        changes.apply_to(&mut updated);
        if updated.password_hash.is_none() && updated.external_id.is_none() {
            return Err(StoreError::CheckViolation {
                constraint: USERS_CREDENTIAL.to_string(),
            });
        }
        updated.updated_at = now;
        *user = updated.clone();
        Ok(Some(updated))
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(&NewUser {
                email: email.to_string(),
                password_hash: Some("hash".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn project(store: &MemoryStore, owner: Uuid, name: &str) -> Project {
        store
            .create_project(
                owner,
                &NewProject {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unique_email_and_external_id() {
        let store = MemoryStore::new();
        user(&store, "a@x.com").await;

        let dup = store
            .create_user(&NewUser {
                email: "a@x.com".to_string(),
                password_hash: Some("other".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(dup, Err(ref e) if e.is_unique_violation_on(USERS_EMAIL)));

        // Case is preserved and compared exactly
        assert!(store.find_user_by_email("A@X.COM").await.unwrap().is_none());

        let oauth = NewUser {
            email: "g@x.com".to_string(),
            external_id: Some("google-1".to_string()),
            ..Default::default()
        };
        store.create_user(&oauth).await.unwrap();
        let again = store
            .create_user(&NewUser {
                email: "h@x.com".to_string(),
                ..oauth.clone()
            })
            .await;
        assert!(matches!(again, Err(ref e) if e.is_unique_violation_on(USERS_EXTERNAL_ID)));
    }

    #[tokio::test]
    async fn test_user_needs_a_credential() {
        let store = MemoryStore::new();
        let result = store
            .create_user(&NewUser {
                email: "a@x.com".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(StoreError::CheckViolation { .. })));
    }

    #[tokio::test]
    async fn test_project_delete_cascades_to_tasks() {
        let store = MemoryStore::new();
        let owner = user(&store, "a@x.com").await;
        let home = project(&store, owner.id, "Home").await;
        let work = project(&store, owner.id, "Work").await;

        store.create_task(owner.id, &NewTask::new(home.id, "Buy milk")).await.unwrap();
        store.create_task(owner.id, &NewTask::new(work.id, "Report")).await.unwrap();

        let deleted = OwnedRepository::<Project>::delete_owned(&store, home.id, owner.id)
            .await
            .unwrap();
        assert!(deleted);

        let remaining = store
            .list_tasks(owner.id, &TaskFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Report");
    }

    #[tokio::test]
    async fn test_foreign_owner_cannot_delete_or_find() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        let home = project(&store, a.id, "Home").await;

        let found: Option<Project> = store.find_owned(home.id, b.id).await.unwrap();
        assert!(found.is_none());

        let deleted = OwnedRepository::<Project>::delete_owned(&store, home.id, b.id)
            .await
            .unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_task_requires_owned_project() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        let home = project(&store, a.id, "Home").await;

        let result = store.create_task(b.id, &NewTask::new(home.id, "Sneaky")).await;
        assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));
    }

    #[tokio::test]
    async fn test_reparent_to_foreign_project_writes_nothing() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        let home = project(&store, a.id, "Home").await;
        let foreign = project(&store, b.id, "Theirs").await;
        let task = store.create_task(a.id, &NewTask::new(home.id, "Buy milk")).await.unwrap();

        let changes = TaskChanges {
            project_id: Some(foreign.id),
            title: Some("Moved".to_string()),
            ..Default::default()
        };
        assert!(store.update_task(task.id, a.id, &changes).await.unwrap().is_none());

        let stored: Task = store.find_owned(task.id, a.id).await.unwrap().unwrap();
        assert_eq!(stored.project_id, home.id);
        assert_eq!(stored.title, "Buy milk");
    }

    #[tokio::test]
    async fn test_projects_in_insertion_order_with_search() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        project(&store, a.id, "Home").await;
        project(&store, a.id, "Work").await;
        project(&store, a.id, "Homework").await;

        let all = store.list_projects(a.id, None, Page::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Home", "Work", "Homework"]);

        let found = store.list_projects(a.id, Some("HOME"), Page::default()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.count_projects(a.id, Some("work")).await.unwrap(), 2);
    }
}
