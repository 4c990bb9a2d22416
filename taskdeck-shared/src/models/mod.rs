/// Database models for TaskDeck
///
/// Each model owns its SQL. Query functions are generic over
/// `sqlx::PgExecutor`, so the same call works against the pool or inside a
/// transaction opened by the Postgres store adapter.
///
/// # Models
///
/// - `user`: accounts and public user summaries
/// - `project`: projects and per-user project overviews
/// - `project_member`: project roles (admin, manager, member)
/// - `team`: teams and per-user team overviews
/// - `team_member`: team roles (owner, admin, member)
/// - `team_invitation`: email invitations into teams
/// - `task`: board tasks and status changes
/// - `notification`: per-user notifications
/// - `conversation`: direct and team conversations and their messages

pub mod conversation;
pub mod notification;
pub mod project;
pub mod project_member;
pub mod task;
pub mod team;
pub mod team_invitation;
pub mod team_member;
pub mod user;
