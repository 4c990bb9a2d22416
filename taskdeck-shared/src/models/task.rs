/// Task model and database operations
///
/// Tasks live on a project's board. Status is a flat set: any status may be
/// set to any other, including reopening a completed task.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in_progress', 'completed');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title TEXT NOT NULL CHECK (length(btrim(title)) > 0),
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'pending',
///     priority task_priority,
///     due_date DATE,
///     due_time TIME,
///     tag TEXT,
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::models::task::{CreateTask, Task, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project_id: Uuid, me: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, &CreateTask {
///     project_id,
///     title: "Write release notes".to_string(),
///     created_by: me,
///     ..CreateTask::default()
/// })
/// .await?;
///
/// if let Some(change) = Task::set_status(&pool, task.id, TaskStatus::Completed).await? {
///     assert!(change.completed_now());
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Board column of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,

    /// Free-form label shown on the card
    pub tag: Option<String>,

    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task; status always starts at `pending`
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub tag: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Uuid,
}

/// Editable task fields
///
/// Outer `None` leaves a field unchanged; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Option<TaskPriority>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub due_time: Option<Option<NaiveTime>>,
    pub tag: Option<Option<String>>,
    pub assigned_to: Option<Option<Uuid>>,
}

/// Result of a status write: the updated task and the status it replaced
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusChange {
    #[sqlx(flatten)]
    pub task: Task,

    pub previous_status: TaskStatus,
}

impl StatusChange {
    /// True when this write moved the task into `completed`
    pub fn completed_now(&self) -> bool {
        self.task.status.is_completed() && !self.previous_status.is_completed()
    }
}

impl Task {
    /// Past due and not yet done, relative to `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_completed() && self.due_date.map_or(false, |due| due < today)
    }

    /// Due after `today` and not yet done
    pub fn is_scheduled(&self, today: NaiveDate) -> bool {
        !self.status.is_completed() && self.due_date.map_or(false, |due| due > today)
    }

    pub fn apply(&mut self, update: UpdateTask) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(due_time) = update.due_time {
            self.due_time = due_time;
        }
        if let Some(tag) = update.tag {
            self.tag = tag;
        }
        if let Some(assigned_to) = update.assigned_to {
            self.assigned_to = assigned_to;
        }
        self.updated_at = Utc::now();
    }

    pub async fn create<'e, E>(executor: E, data: &CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (project_id, title, description, priority, due_date, due_time,
                               tag, assigned_to, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, project_id, title, description, status, priority, due_date, due_time,
                      tag, assigned_to, created_by, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.priority)
        .bind(data.due_date)
        .bind(data.due_time)
        .bind(&data.tag)
        .bind(data.assigned_to)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, title, description, status, priority, due_date, due_time,
                   tag, assigned_to, created_by, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// A project's board, newest first
    pub async fn list_for_project<'e, E>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, title, description, status, priority, due_date, due_time,
                   tag, assigned_to, created_by, created_at, updated_at
            FROM tasks
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    /// Tasks assigned to or created by the user, newest first
    pub async fn list_involving_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, title, description, status, priority, due_date, due_time,
                   tag, assigned_to, created_by, created_at, updated_at
            FROM tasks
            WHERE assigned_to = $1 OR created_by = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Writes every editable field except status
    pub async fn save<'e, E>(&self, executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = $2, description = $3, priority = $4, due_date = $5, due_time = $6,
                tag = $7, assigned_to = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, title, description, status, priority, due_date, due_time,
                      tag, assigned_to, created_by, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.priority)
        .bind(self.due_date)
        .bind(self.due_time)
        .bind(&self.tag)
        .bind(self.assigned_to)
        .fetch_optional(executor)
        .await
    }

    /// Sets the status and reports the one it replaced
    ///
    /// The old row is locked for the duration of the statement so the
    /// previous status is exact even under concurrent writers.
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<StatusChange>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, StatusChange>(
            r#"
            UPDATE tasks t
            SET status = $2, updated_at = NOW()
            FROM (SELECT id, status FROM tasks WHERE id = $1 FOR UPDATE) old
            WHERE t.id = old.id
            RETURNING t.id, t.project_id, t.title, t.description, t.status, t.priority,
                      t.due_date, t.due_time, t.tag, t.assigned_to, t.created_by,
                      t.created_at, t.updated_at, old.status AS previous_status
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus, due: Option<NaiveDate>) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Ship it".to_string(),
            description: None,
            status,
            priority: None,
            due_date: due,
            due_time: None,
            tag: None,
            assigned_to: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
        assert_eq!(TaskPriority::High.as_str(), "high");
    }

    #[test]
    fn test_overdue_and_scheduled() {
        let today = date(2025, 3, 10);

        assert!(task(TaskStatus::Pending, Some(date(2025, 3, 9))).is_overdue(today));
        assert!(!task(TaskStatus::Completed, Some(date(2025, 3, 9))).is_overdue(today));
        assert!(!task(TaskStatus::Pending, Some(today)).is_overdue(today));
        assert!(!task(TaskStatus::Pending, None).is_overdue(today));

        assert!(task(TaskStatus::InProgress, Some(date(2025, 3, 11))).is_scheduled(today));
        assert!(!task(TaskStatus::InProgress, Some(today)).is_scheduled(today));
    }

    #[test]
    fn test_completed_now() {
        let change = StatusChange {
            task: task(TaskStatus::Completed, None),
            previous_status: TaskStatus::InProgress,
        };
        assert!(change.completed_now());

        let again = StatusChange {
            task: task(TaskStatus::Completed, None),
            previous_status: TaskStatus::Completed,
        };
        assert!(!again.completed_now());

        let reopened = StatusChange {
            task: task(TaskStatus::Pending, None),
            previous_status: TaskStatus::Completed,
        };
        assert!(!reopened.completed_now());
    }

    #[test]
    fn test_apply_clears_and_sets() {
        let mut t = task(TaskStatus::Pending, Some(date(2025, 1, 1)));
        let assignee = Uuid::new_v4();

        t.apply(UpdateTask {
            due_date: Some(None),
            assigned_to: Some(Some(assignee)),
            priority: Some(Some(TaskPriority::High)),
            ..Default::default()
        });

        assert_eq!(t.due_date, None);
        assert_eq!(t.assigned_to, Some(assignee));
        assert_eq!(t.priority, Some(TaskPriority::High));
        assert_eq!(t.title, "Ship it");
    }
}
