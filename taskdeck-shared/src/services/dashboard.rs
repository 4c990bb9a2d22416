/// The signed-in user's overview page.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::error::ServiceResult;
use crate::models::{notification::Notification, task::Task, team::TeamOverview};
use crate::store::Store;

const UPCOMING_LIMIT: usize = 4;
const TEAM_LIMIT: usize = 5;
const RECENT_NOTIFICATIONS: i64 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub completed: usize,

    /// Assigned to the caller and not completed
    pub assigned: usize,

    /// Due after today and not completed
    pub scheduled: usize,

    /// Due before today and not completed
    pub overdue: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], user_id: Uuid, today: NaiveDate) -> Self {
        let open = || tasks.iter().filter(|t| !t.status.is_completed());
        Self {
            completed: tasks.iter().filter(|t| t.status.is_completed()).count(),
            assigned: open().filter(|t| t.assigned_to == Some(user_id)).count(),
            scheduled: tasks.iter().filter(|t| t.is_scheduled(today)).count(),
            overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// Tasks assigned to or created by the caller, newest first
    pub tasks: Vec<Task>,
    pub stats: TaskStats,

    /// Open tasks with a due date, soonest first
    pub upcoming: Vec<Task>,

    pub owned_projects: i64,
    pub teams: Vec<TeamOverview>,
    pub recent_notifications: Vec<Notification>,
}

/// Open tasks with a due date, soonest first
fn upcoming(tasks: &[Task]) -> Vec<Task> {
    let mut due: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.status.is_completed() && t.due_date.is_some())
        .cloned()
        .collect();
    due.sort_by_key(|t| (t.due_date, t.due_time));
    due.truncate(UPCOMING_LIMIT);
    due
}

/// Builds the dashboard as of `today`
pub async fn dashboard(store: &dyn Store, caller: Uuid, today: NaiveDate) -> ServiceResult<Dashboard> {
    let tasks = store.list_tasks_involving(caller).await?;
    let owned_projects = store.count_owned_projects(caller).await?;
    let mut teams = store.list_teams_for_user(caller).await?;
    teams.truncate(TEAM_LIMIT);
    let recent_notifications = store
        .list_notifications(caller, RECENT_NOTIFICATIONS, false)
        .await?;

    Ok(Dashboard {
        stats: TaskStats::compute(&tasks, caller, today),
        upcoming: upcoming(&tasks),
        tasks,
        owned_projects,
        teams,
        recent_notifications,
    })
}
