/// Task service
///
/// Same ownership rules as projects, plus one more: a task's project must
/// always belong to the task's owner. That is checked before any write when a
/// task is created or moved, and the store repeats the check inside the write
/// itself so a task never sits in a foreign project, even transiently.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::project::ensure_owner;
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::project::Project;
use crate::models::task::{NewTask, Task, TaskChanges, TaskCountFilter, TaskFilter, TaskStatus};
use crate::models::user::User;
use crate::models::Page;
use crate::store::{ProjectStore, StoreError, TaskStore};

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    projects: Arc<dyn ProjectStore>,
    clock: Arc<dyn Clock>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        projects: Arc<dyn ProjectStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            projects,
            clock,
        }
    }

    async fn ensure_project_owned(&self, project_id: Uuid, caller: &User) -> CoreResult<()> {
        let project: Option<Project> = self.projects.find_owned(project_id, caller.id).await?;
        if project.is_none() {
            warn!(user_id = %caller.id, %project_id, "Task references a project the caller does not own");
            return Err(CoreError::Forbidden);
        }
        Ok(())
    }

    pub async fn get(&self, task_id: Uuid, caller: &User) -> CoreResult<Task> {
        self.tasks
            .find_owned(task_id, caller.id)
            .await?
            .ok_or(CoreError::NotFound)
    }

    /// Caller's tasks matching every filter, newest first
    pub async fn list(&self, caller: &User, filter: &TaskFilter, page: Page) -> CoreResult<Vec<Task>> {
        page.validate()?;
        Ok(self.tasks.list_tasks(caller.id, filter, page).await?)
    }

    /// Total for pagination; honours project, status and quadrant
    pub async fn count(&self, caller: &User, filter: &TaskCountFilter) -> CoreResult<i64> {
        Ok(self.tasks.count_tasks(caller.id, filter).await?)
    }

    /// # Errors
    ///
    /// - `InvalidInput` if the title is empty or too long
    /// - `Forbidden` if the caller does not own `input.project_id`
    pub async fn create(&self, caller: &User, input: NewTask) -> CoreResult<Task> {
        input.validate()?;
        self.ensure_project_owned(input.project_id, caller).await?;

        let task = self
            .tasks
            .create_task(caller.id, &input)
            .await
            .map_err(|e| match e {
                // The project disappeared or changed hands after the check
                StoreError::ForeignKeyViolation { .. } => CoreError::Forbidden,
                other => other.into(),
            })?;

        info!(user_id = %caller.id, task_id = %task.id, quadrant = task.quadrant().number(), "Task created");
        Ok(task)
    }

    /// Partial update
    ///
    /// Moving the task to another project requires owning that project too;
    /// otherwise nothing changes and `Forbidden` is returned.
    pub async fn update(&self, task: &Task, caller: &User, changes: TaskChanges) -> CoreResult<Task> {
        ensure_owner(task.owner_id, caller)?;
        changes.validate()?;

        if let Some(project_id) = changes.project_id {
            if project_id != task.project_id {
                self.ensure_project_owned(project_id, caller).await?;
            }
        }

        if changes.is_empty() {
            return Ok(task.clone());
        }

        let updated = match self.tasks.update_task(task.id, caller.id, &changes).await? {
            Some(updated) => updated,
            None if changes.project_id.is_some() => {
                // Either the task vanished or the target project did
                return match self.tasks.find_owned(task.id, caller.id).await? {
                    Some(_) => Err(CoreError::Forbidden),
                    None => Err(CoreError::NotFound),
                };
            }
            None => return Err(CoreError::NotFound),
        };

        info!(user_id = %caller.id, task_id = %updated.id, "Task updated");
        Ok(updated)
    }

    /// Changes only the urgency and importance flags
    pub async fn move_to_quadrant(
        &self,
        task: &Task,
        caller: &User,
        is_urgent: bool,
        is_important: bool,
    ) -> CoreResult<Task> {
        let changes = TaskChanges {
            is_urgent: Some(is_urgent),
            is_important: Some(is_important),
            ..Default::default()
        };
        self.update(task, caller, changes).await
    }

    pub async fn update_status(&self, task: &Task, caller: &User, status: TaskStatus) -> CoreResult<Task> {
        let changes = TaskChanges {
            status: Some(status),
            ..Default::default()
        };
        self.update(task, caller, changes).await
    }

    pub async fn delete(&self, task: &Task, caller: &User) -> CoreResult<()> {
        ensure_owner(task.owner_id, caller)?;

        if !self.tasks.delete_owned(task.id, caller.id).await? {
            return Err(CoreError::NotFound);
        }

        info!(user_id = %caller.id, task_id = %task.id, "Task deleted");
        Ok(())
    }

    /// Caller's unfinished tasks past their deadline, unpaginated
    pub async fn list_overdue(&self, caller: &User) -> CoreResult<Vec<Task>> {
        let now = self.clock.now();
        Ok(self.tasks.list_overdue(caller.id, now).await?)
    }
}
