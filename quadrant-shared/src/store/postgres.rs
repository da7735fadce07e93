/// PostgreSQL store
///
/// Each mutation is one SQL statement, so it commits or fails as a unit
/// without an explicit transaction. Constraint violations are classified by
/// SQLSTATE into [`StoreError`] variants:
///
/// - `23505` unique violation
/// - `23503` foreign key violation
/// - `23514` check violation
///
/// # Example
///
/// ```no_run
/// use quadrant_shared::db::pool::{create_pool, DatabaseConfig};
/// use quadrant_shared::store::{PgStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_env()?).await?;
/// let store = PgStore::new(pool);
/// let user = store.find_user_by_email("a@x.com").await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{OwnedRepository, ProjectStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::project::{NewProject, Project, ProjectChanges};
use crate::models::task::{NewTask, Task, TaskChanges, TaskCountFilter, TaskFilter};
use crate::models::user::{NewUser, User, UserChanges};
use crate::models::{Owned, Page};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, is_active, is_verified, \
     external_id, avatar_url, created_at, updated_at, last_login";

const PROJECT_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

const TASK_COLUMNS: &str = "id, owner_id, project_id, title, description, is_urgent, \
     is_important, status, priority, deadline, created_at, updated_at";

/// Table metadata for entities served by the generic owner-scoped queries
pub trait OwnedTable: Owned + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
}

impl OwnedTable for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static str = PROJECT_COLUMNS;
}

impl OwnedTable for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static str = TASK_COLUMNS;
}

/// sqlx-backed implementation of every store trait
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps driver errors onto constraint-aware store errors
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let constraint = db.constraint().unwrap_or_default().to_string();
        match db.code().as_deref() {
            Some("23505") => return StoreError::UniqueViolation { constraint },
            Some("23503") => return StoreError::ForeignKeyViolation { constraint },
            Some("23514") => return StoreError::CheckViolation { constraint },
            _ => {}
        }
    }
    StoreError::Database(err)
}

/// Builds an ILIKE pattern matching `term` literally anywhere
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn normalized_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

fn push_project_predicates(
    qb: &mut QueryBuilder<'_, Postgres>,
    owner_id: Uuid,
    search: Option<&str>,
) {
    qb.push(" WHERE owner_id = ").push_bind(owner_id);
    if let Some(term) = normalized_search(search) {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_count_predicates(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskCountFilter) {
    if let Some(project_id) = filter.project_id {
        qb.push(" AND project_id = ").push_bind(project_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(quadrant) = filter.quadrant {
        let (urgent, important) = quadrant.flags();
        qb.push(" AND is_urgent = ")
            .push_bind(urgent)
            .push(" AND is_important = ")
            .push_bind(important);
    }
}

fn push_task_predicates(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    push_count_predicates(qb, &TaskCountFilter::from(filter));
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(urgent) = filter.is_urgent {
        qb.push(" AND is_urgent = ").push_bind(urgent);
    }
    if let Some(important) = filter.is_important {
        qb.push(" AND is_important = ").push_bind(important);
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl<T> OwnedRepository<T> for PgStore
where
    T: OwnedTable,
{
    async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND owner_id = $2",
            T::COLUMNS,
            T::TABLE
        );
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND owner_id = $2", T::TABLE);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        tracing::debug!(table = T::TABLE, %id, deleted = result.rows_affected(), "delete_owned");
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn list_projects(
        &self,
        owner_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> StoreResult<Vec<Project>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM projects", PROJECT_COLUMNS));
        push_project_predicates(&mut qb, owner_id, search);
        qb.push(" ORDER BY created_at ASC, id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.skip);

        qb.build_query_as::<Project>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn count_projects(&self, owner_id: Uuid, search: Option<&str>) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects");
        push_project_predicates(&mut qb, owner_id, search);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_project(&self, owner_id: Uuid, input: &NewProject) -> StoreResult<Project> {
        let sql = format!(
            "INSERT INTO projects (owner_id, name, description) VALUES ($1, $2, $3) RETURNING {}",
            PROJECT_COLUMNS
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &ProjectChanges,
    ) -> StoreResult<Option<Project>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET updated_at = clock_timestamp()");
        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND owner_id = ")
            .push_bind(owner_id)
            .push(" RETURNING ")
            .push(PROJECT_COLUMNS);

        qb.build_query_as::<Project>()
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn count_project_tasks(&self, project_id: Uuid, owner_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE project_id = $1 AND owner_id = $2",
        )
        .bind(project_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_tasks(
        &self,
        owner_id: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> StoreResult<Vec<Task>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        qb.push(" WHERE owner_id = ").push_bind(owner_id);
        push_task_predicates(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.skip);

        tracing::debug!(sql = qb.sql(), "list_tasks");

        qb.build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn count_tasks(&self, owner_id: Uuid, filter: &TaskCountFilter) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        qb.push(" WHERE owner_id = ").push_bind(owner_id);
        push_count_predicates(&mut qb, filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_task(&self, owner_id: Uuid, input: &NewTask) -> StoreResult<Task> {
        // The composite (project_id, owner_id) foreign key rejects foreign projects
        let sql = format!(
            r#"
            INSERT INTO tasks (owner_id, project_id, title, description, is_urgent,
                               is_important, status, priority, deadline)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .bind(input.project_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.is_urgent)
            .bind(input.is_important)
            .bind(input.status)
            .bind(input.priority)
            .bind(input.deadline)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TaskChanges,
    ) -> StoreResult<Option<Task>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = clock_timestamp()");
        if let Some(project_id) = changes.project_id {
            qb.push(", project_id = ").push_bind(project_id);
        }
        if let Some(title) = &changes.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(urgent) = changes.is_urgent {
            qb.push(", is_urgent = ").push_bind(urgent);
        }
        if let Some(important) = changes.is_important {
            qb.push(", is_important = ").push_bind(important);
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = changes.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(deadline) = changes.deadline {
            qb.push(", deadline = ").push_bind(deadline);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND owner_id = ")
            .push_bind(owner_id);

        // Reparenting only happens if the target project shares the owner
        if let Some(project_id) = changes.project_id {
            qb.push(" AND EXISTS (SELECT 1 FROM projects WHERE id = ")
                .push_bind(project_id)
                .push(" AND owner_id = ")
                .push_bind(owner_id)
                .push(")");
        }
        qb.push(" RETURNING ").push(TASK_COLUMNS);

        qb.build_query_as::<Task>()
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_overdue(&self, owner_id: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE owner_id = $1 AND deadline < $2 AND status <> 'done'
            ORDER BY deadline ASC, id ASC
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE external_id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, is_verified, external_id, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.full_name)
            .bind(input.is_verified)
            .bind(&input.external_id)
            .bind(&input.avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = clock_timestamp()");
        if let Some(email) = &changes.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(hash) = &changes.password_hash {
            qb.push(", password_hash = ").push_bind(hash.clone());
        }
        if let Some(full_name) = &changes.full_name {
            qb.push(", full_name = ").push_bind(full_name.clone());
        }
        if let Some(active) = changes.is_active {
            qb.push(", is_active = ").push_bind(active);
        }
        if let Some(verified) = changes.is_verified {
            qb.push(", is_verified = ").push_bind(verified);
        }
        if let Some(external_id) = &changes.external_id {
            qb.push(", external_id = ").push_bind(external_id.clone());
        }
        if let Some(avatar_url) = &changes.avatar_url {
            qb.push(", avatar_url = ").push_bind(avatar_url.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        qb.build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert_eq!(normalized_search(Some("  ")), None);
        assert_eq!(normalized_search(Some(" home ")), Some("home"));
        assert_eq!(normalized_search(None), None);
    }

    #[test]
    fn test_task_predicates_cover_every_filter() {
        let filter = TaskFilter {
            project_id: Some(Uuid::new_v4()),
            status: Some(crate::models::task::TaskStatus::Done),
            priority: Some(crate::models::task::TaskPriority::MustHave),
            is_urgent: Some(true),
            is_important: Some(false),
            quadrant: Some(crate::models::task::Quadrant::Delegate),
            search: Some("milk".to_string()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM tasks WHERE owner_id = $1");
        push_task_predicates(&mut qb, &filter);
        let sql = qb.sql();

        for column in ["project_id", "status", "priority", "is_urgent", "is_important", "title ILIKE"] {
            assert!(sql.contains(column), "missing {column} in {sql}");
        }
    }
}
