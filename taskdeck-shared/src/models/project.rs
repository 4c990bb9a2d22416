/// Project model and database operations
///
/// A project is owned by the user who created it. The owner is materialized
/// as an `admin` row in `project_members` when the project is created, and is
/// treated as an admin by the authorization resolver even without that row.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('active', 'on_hold', 'archived');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     description TEXT,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     status project_status NOT NULL DEFAULT 'active',
///     team_id UUID REFERENCES teams(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::project_member::ProjectRole;

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Archived => "archived",
        }
    }
}

/// A project row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Creator; immutable
    pub owner_id: Uuid,

    pub status: ProjectStatus,

    /// Linked team, set by the owner through team creation
    pub team_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Editable project fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

/// A project as listed for one user: their effective role and its task count
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,

    /// Caller's effective role (owner resolves to admin)
    pub role: ProjectRole,

    pub task_count: i64,
}

impl Project {
    /// Applies an update in memory and bumps `updated_at`
    pub fn apply(&mut self, update: UpdateProject) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }

    /// Inserts a project with status `active`
    ///
    /// The owner's membership row is not written here; see
    /// `ProjectMember::create` and the store's transactional
    /// `create_project_with_owner`.
    pub async fn create<'e, E>(executor: E, data: &CreateProject) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id, status, team_id, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.owner_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, owner_id, status, team_id, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists projects the user owns or is a member of, newest first
    pub async fn list_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<ProjectOverview>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectOverview>(
            r#"
            SELECT p.id, p.name, p.description, p.owner_id, p.status, p.team_id,
                   p.created_at, p.updated_at,
                   CASE WHEN p.owner_id = $1 THEN 'admin'::project_role ELSE pm.role END AS role,
                   (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS task_count
            FROM projects p
            LEFT JOIN project_members pm ON pm.project_id = p.id AND pm.user_id = $1
            WHERE p.owner_id = $1 OR pm.user_id IS NOT NULL
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }

    /// Writes the editable fields of `self` back to its row
    ///
    /// Returns `None` if the project no longer exists.
    pub async fn save<'e, E>(&self, executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = $2, description = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, owner_id, status, team_id, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.status)
        .fetch_optional(executor)
        .await
    }

    /// Links a team, but only when `owner_id` owns the project
    ///
    /// Returns whether a row was updated.
    pub async fn link_team<'e, E>(
        executor: E,
        project_id: Uuid,
        team_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET team_id = $2, updated_at = NOW()
            WHERE id = $1 AND owner_id = $3
            "#,
        )
        .bind(project_id)
        .bind(team_id)
        .bind(owner_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a project; members and tasks cascade
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_owned<'e, E>(executor: E, owner_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Website".to_string(),
            description: None,
            owner_id: Uuid::new_v4(),
            status: ProjectStatus::Active,
            team_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ProjectStatus::OnHold).unwrap(), "\"on_hold\"");
        assert_eq!(
            serde_json::from_str::<ProjectStatus>("\"archived\"").unwrap(),
            ProjectStatus::Archived
        );
        assert_eq!(ProjectStatus::default(), ProjectStatus::Active);
    }

    #[test]
    fn test_apply_only_touches_given_fields() {
        let mut p = project();
        let owner = p.owner_id;

        p.apply(UpdateProject {
            status: Some(ProjectStatus::OnHold),
            ..Default::default()
        });

        assert_eq!(p.name, "Website");
        assert_eq!(p.status, ProjectStatus::OnHold);
        assert_eq!(p.owner_id, owner);

        p.apply(UpdateProject {
            name: Some("Site v2".to_string()),
            description: Some("Relaunch".to_string()),
            status: None,
        });
        assert_eq!(p.name, "Site v2");
        assert_eq!(p.description.as_deref(), Some("Relaunch"));
        assert_eq!(p.status, ProjectStatus::OnHold);
    }
}
