/// Service operations.
///
/// Every operation is a free async function taking the store and the caller's
/// user id. Authorization happens here, through [`crate::auth::authorization`],
/// so every surface built on top gets the same rules.

pub mod dashboard;
pub mod error;
pub mod identity;
pub mod messages;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod teams;

pub use error::{ServiceError, ServiceResult};
