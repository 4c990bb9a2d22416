/// Task lifecycle: creation, edits, status changes and project reports.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{optional_text, required_text, ServiceError, ServiceResult};
use super::notifications::notify;
use crate::auth::authorization::{require_project_action, ProjectAccess, ProjectAction};
use crate::models::{
    notification::{Notification, NotificationType},
    task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask},
    user::UserSummary,
};
use crate::store::Store;

/// Input for [`create_task`]
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    /// `None` is rejected: a task always belongs to a project
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub tag: Option<String>,
    pub assigned_to: Option<Uuid>,
}

/// A task with the people and project it refers to
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub project_name: String,
    pub assignee: Option<UserSummary>,
    pub creator: Option<UserSummary>,
}

/// A board card
#[derive(Debug, Clone, Serialize)]
pub struct TaskCard {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: Option<UserSummary>,
}

/// Result of [`update_task_status`]
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub task: Task,

    /// The `task_completed` notification, when one was sent
    pub notification: Option<Notification>,

    /// Set when the status was saved but the notification failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityCount {
    pub priority: TaskPriority,
    pub count: usize,
}

/// Completion statistics for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub project_id: Uuid,
    pub total: usize,
    pub completed: usize,

    /// Rounded percentage, 0 for an empty project
    pub completion_rate: u32,

    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,

    /// Tasks without a priority
    pub unprioritized: usize,
}

impl ProjectReport {
    pub fn from_tasks(project_id: Uuid, tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.status.is_completed()).count();
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        let by_status = TaskStatus::ALL
            .iter()
            .map(|&status| StatusCount {
                status,
                count: tasks.iter().filter(|t| t.status == status).count(),
            })
            .collect();
        let by_priority = TaskPriority::ALL
            .iter()
            .map(|&priority| PriorityCount {
                priority,
                count: tasks.iter().filter(|t| t.priority == Some(priority)).count(),
            })
            .collect();

        Self {
            project_id,
            total,
            completed,
            completion_rate,
            by_status,
            by_priority,
            unprioritized: tasks.iter().filter(|t| t.priority.is_none()).count(),
        }
    }
}

/// Assignees must be on the project
async fn check_assignee(
    store: &dyn Store,
    access: &ProjectAccess,
    assignee: Option<Uuid>,
) -> ServiceResult<()> {
    let Some(user_id) = assignee else {
        return Ok(());
    };
    if access.is_owner(user_id)
        || store
            .find_project_member(access.project.id, user_id)
            .await?
            .is_some()
    {
        return Ok(());
    }
    Err(ServiceError::validation(
        "assigned_to",
        "Assignee must be a member of the project",
    ))
}

async fn load_task(store: &dyn Store, task_id: Uuid) -> ServiceResult<Task> {
    store
        .find_task(task_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))
}

/// Loads a task and checks `action` on its project; tasks of invisible
/// projects are reported as missing tasks
async fn task_access(
    store: &dyn Store,
    caller: Uuid,
    task_id: Uuid,
    action: ProjectAction,
) -> ServiceResult<(Task, ProjectAccess)> {
    let task = load_task(store, task_id).await?;
    let access = require_project_action(store, caller, task.project_id, action)
        .await
        .map_err(|e| match ServiceError::from(e) {
            ServiceError::NotFound(_) => ServiceError::not_found("task"),
            other => other,
        })?;
    Ok((task, access))
}

async fn summaries(store: &dyn Store, ids: &[Uuid]) -> ServiceResult<HashMap<Uuid, UserSummary>> {
    Ok(store
        .find_user_summaries(ids)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

/// Creates a task in `pending`
///
/// # Errors
///
/// - `Validation` for a missing project, blank title or non-member assignee
/// - `PermissionDenied` unless the caller is an admin or manager
pub async fn create_task(store: &dyn Store, caller: Uuid, draft: TaskDraft) -> ServiceResult<Task> {
    let project_id = draft
        .project_id
        .ok_or_else(|| ServiceError::validation("project_id", "Please select a project"))?;
    let title = required_text("title", &draft.title)?;

    let access = require_project_action(store, caller, project_id, ProjectAction::CreateTask).await?;
    check_assignee(store, &access, draft.assigned_to).await?;

    let task = store
        .create_task(CreateTask {
            project_id,
            title,
            description: optional_text(draft.description),
            priority: draft.priority,
            due_date: draft.due_date,
            due_time: draft.due_time,
            tag: optional_text(draft.tag),
            assigned_to: draft.assigned_to,
            created_by: caller,
        })
        .await?;

    info!(task_id = %task.id, project_id = %project_id, created_by = %caller, "Task created");
    Ok(task)
}

pub async fn get_task(store: &dyn Store, caller: Uuid, task_id: Uuid) -> ServiceResult<TaskDetail> {
    let (task, access) = task_access(store, caller, task_id, ProjectAction::View).await?;

    let mut ids = vec![task.created_by];
    ids.extend(task.assigned_to);
    let people = summaries(store, &ids).await?;

    Ok(TaskDetail {
        assignee: task.assigned_to.and_then(|id| people.get(&id).cloned()),
        creator: people.get(&task.created_by).cloned(),
        project_name: access.project.name,
        task,
    })
}

/// The project's tasks, newest first, with assignees
pub async fn list_project_tasks(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
) -> ServiceResult<Vec<TaskCard>> {
    require_project_action(store, caller, project_id, ProjectAction::View).await?;

    let tasks = store.list_project_tasks(project_id).await?;
    let assignee_ids: Vec<Uuid> = tasks.iter().filter_map(|t| t.assigned_to).collect();
    let people = summaries(store, &assignee_ids).await?;

    Ok(tasks
        .into_iter()
        .map(|task| TaskCard {
            assignee: task.assigned_to.and_then(|id| people.get(&id).cloned()),
            task,
        })
        .collect())
}

/// Edits everything but the status
pub async fn update_task(
    store: &dyn Store,
    caller: Uuid,
    task_id: Uuid,
    update: UpdateTask,
) -> ServiceResult<Task> {
    let (mut task, access) = task_access(store, caller, task_id, ProjectAction::EditTask).await?;

    let update = UpdateTask {
        title: update.title.as_deref().map(|t| required_text("title", t)).transpose()?,
        description: update.description.map(optional_text),
        tag: update.tag.map(optional_text),
        ..update
    };
    if let Some(assignee) = update.assigned_to {
        check_assignee(store, &access, assignee).await?;
    }
    task.apply(update);

    store
        .save_task(&task)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))
}

pub async fn delete_task(store: &dyn Store, caller: Uuid, task_id: Uuid) -> ServiceResult<()> {
    task_access(store, caller, task_id, ProjectAction::DeleteTask).await?;

    if !store.delete_task(task_id).await? {
        return Err(ServiceError::not_found("task"));
    }
    info!(task_id = %task_id, deleted_by = %caller, "Task deleted");
    Ok(())
}

/// Moves a task to `status`
///
/// Entering `completed` with an assignee sends them one `task_completed`
/// notification. The status change stands even if that notification fails;
/// the failure comes back as `warning`.
pub async fn update_task_status(
    store: &dyn Store,
    caller: Uuid,
    task_id: Uuid,
    status: TaskStatus,
) -> ServiceResult<StatusUpdate> {
    task_access(store, caller, task_id, ProjectAction::UpdateTaskStatus).await?;

    let change = store
        .set_task_status(task_id, status)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;

    info!(
        task_id = %task_id,
        from = change.previous_status.as_str(),
        to = change.task.status.as_str(),
        "Task status changed"
    );

    let completed_now = change.completed_now();
    let mut update = StatusUpdate {
        task: change.task,
        notification: None,
        warning: None,
    };

    let assignee = match update.task.assigned_to {
        Some(assignee) if completed_now => assignee,
        _ => return Ok(update),
    };

    let message = format!("Task \"{}\" has been completed", update.task.title);
    match notify(store, assignee, NotificationType::TaskCompleted, message, Some(task_id)).await {
        Ok(notification) => update.notification = Some(notification),
        Err(e) => {
            warn!(task_id = %task_id, assignee = %assignee, error = %e, "Completion notification failed");
            update.warning = Some("Task updated, but the assignee could not be notified".to_string());
        }
    }

    Ok(update)
}

/// Completion statistics; admins and managers only
pub async fn project_report(
    store: &dyn Store,
    caller: Uuid,
    project_id: Uuid,
) -> ServiceResult<ProjectReport> {
    require_project_action(store, caller, project_id, ProjectAction::ViewReports).await?;
    let tasks = store.list_project_tasks(project_id).await?;
    Ok(ProjectReport::from_tasks(project_id, &tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        project::CreateProject,
        project_member::{CreateProjectMember, ProjectRole},
        user::CreateUser,
    };
    use crate::store::{MemoryStore, NotificationStore, ProjectStore, TaskStore, UserStore};

    struct Board {
        store: MemoryStore,
        project: Uuid,
        owner: Uuid,
        manager: Uuid,
        member: Uuid,
    }

    async fn user(store: &MemoryStore, email: &str) -> Uuid {
        store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn board() -> Board {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@x.com").await;
        let manager = user(&store, "manager@x.com").await;
        let member = user(&store, "member@x.com").await;
        let project = store
            .create_project_with_owner(CreateProject {
                name: "Launch".to_string(),
                description: None,
                owner_id: owner,
            })
            .await
            .unwrap()
            .id;
        for (user_id, role) in [(manager, ProjectRole::Manager), (member, ProjectRole::Member)] {
            store
                .add_project_member(CreateProjectMember {
                    project_id: project,
                    user_id,
                    role,
                })
                .await
                .unwrap();
        }
        Board {
            store,
            project,
            owner,
            manager,
            member,
        }
    }

    fn draft(board: &Board, title: &str) -> TaskDraft {
        TaskDraft {
            project_id: Some(board.project),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_task_roles_and_validation() {
        let b = board().await;

        let task = create_task(&b.store, b.manager, draft(&b, "Write docs")).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_by, b.manager);

        let listed = list_project_tasks(&b.store, b.member, b.project).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].task.id, task.id);

        assert!(matches!(
            create_task(&b.store, b.member, draft(&b, "Nope")).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        assert!(matches!(
            create_task(&b.store, b.owner, draft(&b, "   ")).await,
            Err(ServiceError::Validation { field: "title", .. })
        ));
        assert!(matches!(
            create_task(&b.store, b.owner, TaskDraft { project_id: None, ..draft(&b, "x") }).await,
            Err(ServiceError::Validation { field: "project_id", .. })
        ));

        let outsider = user(&b.store, "outsider@x.com").await;
        let assigned_out = TaskDraft {
            assigned_to: Some(outsider),
            ..draft(&b, "x")
        };
        assert!(matches!(
            create_task(&b.store, b.owner, assigned_out).await,
            Err(ServiceError::Validation { field: "assigned_to", .. })
        ));
    }

    #[tokio::test]
    async fn test_completion_notifies_assignee_once() {
        let b = board().await;
        let task = create_task(
            &b.store,
            b.owner,
            TaskDraft {
                assigned_to: Some(b.member),
                ..draft(&b, "Ship it")
            },
        )
        .await
        .unwrap();

        let progress = update_task_status(&b.store, b.member, task.id, TaskStatus::InProgress)
            .await
            .unwrap();
        assert!(progress.notification.is_none());

        let done = update_task_status(&b.store, b.member, task.id, TaskStatus::Completed)
            .await
            .unwrap();
        let notification = done.notification.unwrap();
        assert_eq!(notification.user_id, b.member);
        assert_eq!(notification.kind, NotificationType::TaskCompleted);
        assert_eq!(notification.related_id, Some(task.id));
        assert_eq!(notification.message, "Task \"Ship it\" has been completed");

        let again = update_task_status(&b.store, b.member, task.id, TaskStatus::Completed)
            .await
            .unwrap();
        assert!(again.notification.is_none());
        assert_eq!(b.store.list_notifications(b.member, 10, false).await.unwrap().len(), 1);

        let reopened = update_task_status(&b.store, b.member, task.id, TaskStatus::Pending)
            .await
            .unwrap();
        assert_eq!(reopened.task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let b = board().await;
        let task = create_task(&b.store, b.owner, draft(&b, "Draft")).await.unwrap();

        let updated = update_task(
            &b.store,
            b.manager,
            task.id,
            UpdateTask {
                title: Some(" Final ".to_string()),
                priority: Some(Some(TaskPriority::High)),
                assigned_to: Some(Some(b.member)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.priority, Some(TaskPriority::High));
        assert_eq!(updated.status, TaskStatus::Pending);

        let detail = get_task(&b.store, b.member, task.id).await.unwrap();
        assert_eq!(detail.project_name, "Launch");
        assert_eq!(detail.assignee.unwrap().id, b.member);
        assert_eq!(detail.creator.unwrap().id, b.owner);

        assert!(matches!(
            delete_task(&b.store, b.member, task.id).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        delete_task(&b.store, b.manager, task.id).await.unwrap();
        assert!(matches!(
            get_task(&b.store, b.owner, task.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report() {
        let b = board().await;
        let drafts = [
            ("a", Some(TaskPriority::High)),
            ("b", None),
            ("c", Some(TaskPriority::Low)),
        ];
        for (title, priority) in drafts {
            create_task(
                &b.store,
                b.owner,
                TaskDraft {
                    priority,
                    ..draft(&b, title)
                },
            )
            .await
            .unwrap();
        }
        let tasks = b.store.list_project_tasks(b.project).await.unwrap();
        update_task_status(&b.store, b.owner, tasks[0].id, TaskStatus::Completed)
            .await
            .unwrap();

        let report = project_report(&b.store, b.manager, b.project).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.completed, 1);
        assert_eq!(report.completion_rate, 33);
        assert_eq!(report.unprioritized, 1);
        assert_eq!(report.by_status[2], StatusCount { status: TaskStatus::Completed, count: 1 });

        assert!(matches!(
            project_report(&b.store, b.member, b.project).await,
            Err(ServiceError::PermissionDenied(_))
        ));
        assert_eq!(ProjectReport::from_tasks(b.project, &[]).completion_rate, 0);
    }
}
