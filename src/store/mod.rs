//! Data access.
//!
//! # Responsibilities
//! - Define the [`DataStore`] seam the HTTP handlers call through
//! - Provide an in-memory implementation with fault injection
//!
//! # Design Decisions
//! - Boxed futures keep the trait object-safe (`Arc<dyn DataStore>`)
//! - Errors are cloneable so retries can report the last one unchanged

pub mod memory;
pub mod models;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use memory::MemoryStore;
pub use models::{
    NewProject, NewTask, NewUser, Project, ProjectStatistics, ProjectUpdate, Task, TaskUpdate,
    User,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the handlers.
pub trait DataStore: Send + Sync {
    fn list_users(&self) -> BoxFuture<'_, StoreResult<Vec<User>>>;
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, StoreResult<User>>;
    fn delete_user(&self, id: u64) -> BoxFuture<'_, StoreResult<()>>;
    fn tasks_by_user(&self, user_id: u64) -> BoxFuture<'_, StoreResult<Vec<Task>>>;

    fn list_projects(&self) -> BoxFuture<'_, StoreResult<Vec<Project>>>;
    fn get_project(&self, id: u64) -> BoxFuture<'_, StoreResult<Project>>;
    fn create_project(&self, project: NewProject) -> BoxFuture<'_, StoreResult<Project>>;
    fn update_project(&self, id: u64, update: ProjectUpdate) -> BoxFuture<'_, StoreResult<Project>>;
    fn delete_project(&self, id: u64) -> BoxFuture<'_, StoreResult<()>>;
    fn tasks_by_project(&self, project_id: u64, pending_only: bool)
        -> BoxFuture<'_, StoreResult<Vec<Task>>>;

    fn list_tasks(&self) -> BoxFuture<'_, StoreResult<Vec<Task>>>;
    fn get_task(&self, id: u64) -> BoxFuture<'_, StoreResult<Task>>;
    fn create_task(&self, task: NewTask) -> BoxFuture<'_, StoreResult<Task>>;
    fn update_task(&self, id: u64, update: TaskUpdate) -> BoxFuture<'_, StoreResult<Task>>;
    fn delete_task(&self, id: u64) -> BoxFuture<'_, StoreResult<()>>;

    fn statistics(&self) -> BoxFuture<'_, StoreResult<Vec<ProjectStatistics>>>;
    fn project_statistics(&self, project_id: u64) -> BoxFuture<'_, StoreResult<ProjectStatistics>>;

    /// Cheap liveness probe.
    fn ping(&self) -> BoxFuture<'_, StoreResult<()>>;
}
