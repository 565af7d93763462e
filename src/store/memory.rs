//! In-memory [`DataStore`] with fault injection.
//!
//! `fail_next(n)` makes the next `n` calls return `Unavailable`, and
//! `set_latency` delays every call. Both are used to exercise retries and
//! bulkhead saturation without a real database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::RwLock;

use crate::store::models::*;
use crate::store::{DataStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    projects: BTreeMap<u64, Project>,
    tasks: BTreeMap<u64, Task>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failures: AtomicU32,
    latency_ms: AtomicU64,
    calls: AtomicU64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn required(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{} is required", field)));
    }
    Ok(())
}

fn stats_for(project: &Project, tasks: &BTreeMap<u64, Task>) -> ProjectStatistics {
    let (total, completed) = tasks
        .values()
        .filter(|t| t.project_id == project.id)
        .fold((0, 0), |(total, done), t| (total + 1, done + usize::from(t.completed)));
    ProjectStatistics {
        project_id: project.id,
        project_name: project.name.clone(),
        total_tasks: total,
        completed_tasks: completed,
        pending_tasks: total - completed,
        completion_rate: if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        },
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with a few rows, used by the binary in development.
    pub async fn seeded() -> Self {
        let store = Self::new();
        let seed = async {
            let ada = store
                .create_user(NewUser { name: "Ada".into(), email: "ada@example.com".into() })
                .await?;
            let linus = store
                .create_user(NewUser { name: "Linus".into(), email: "linus@example.com".into() })
                .await?;
            let apollo = store
                .create_project(NewProject {
                    name: "Apollo".into(),
                    description: Some("Flight software".into()),
                })
                .await?;
            for (title, user_id) in [("Design guidance loop", ada.id), ("Write tests", linus.id)] {
                store
                    .create_task(NewTask { title: title.into(), user_id, project_id: apollo.id })
                    .await?;
            }
            Ok::<_, StoreError>(())
        };
        if let Err(e) = seed.await {
            tracing::warn!(error = %e, "Failed to seed in-memory store");
        }
        store
    }

    /// Fail the next `n` calls with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total calls observed, including injected failures.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &'static str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            tracing::debug!(operation, "Injected datastore failure");
            return Err(StoreError::Unavailable(format!("{}: connection reset", operation)));
        }
        Ok(())
    }
}

impl DataStore for MemoryStore {
    fn list_users(&self) -> BoxFuture<'_, StoreResult<Vec<User>>> {
        async move {
            self.enter("list_users").await?;
            Ok(self.tables.read().await.users.values().cloned().collect())
        }
        .boxed()
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, StoreResult<User>> {
        async move {
            self.enter("create_user").await?;
            required("name", &user.name)?;
            required("email", &user.email)?;

            let mut tables = self.tables.write().await;
            if tables.users.values().any(|u| u.email == user.email) {
                return Err(StoreError::Invalid(format!("email {} already registered", user.email)));
            }
            let id = tables.next_id();
            let created = User { id, name: user.name, email: user.email, created_at_ms: now_ms() };
            tables.users.insert(id, created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn delete_user(&self, id: u64) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            self.enter("delete_user").await?;
            let mut tables = self.tables.write().await;
            tables
                .users
                .remove(&id)
                .ok_or(StoreError::NotFound { entity: "user", id })?;
            tables.tasks.retain(|_, t| t.user_id != id);
            Ok(())
        }
        .boxed()
    }

    fn tasks_by_user(&self, user_id: u64) -> BoxFuture<'_, StoreResult<Vec<Task>>> {
        async move {
            self.enter("tasks_by_user").await?;
            let tables = self.tables.read().await;
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::NotFound { entity: "user", id: user_id });
            }
            Ok(tables.tasks.values().filter(|t| t.user_id == user_id).cloned().collect())
        }
        .boxed()
    }

    fn list_projects(&self) -> BoxFuture<'_, StoreResult<Vec<Project>>> {
        async move {
            self.enter("list_projects").await?;
            Ok(self.tables.read().await.projects.values().cloned().collect())
        }
        .boxed()
    }

    fn get_project(&self, id: u64) -> BoxFuture<'_, StoreResult<Project>> {
        async move {
            self.enter("get_project").await?;
            self.tables
                .read()
                .await
                .projects
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound { entity: "project", id })
        }
        .boxed()
    }

    fn create_project(&self, project: NewProject) -> BoxFuture<'_, StoreResult<Project>> {
        async move {
            self.enter("create_project").await?;
            required("name", &project.name)?;

            let mut tables = self.tables.write().await;
            let id = tables.next_id();
            let now = now_ms();
            let created = Project {
                id,
                name: project.name,
                description: project.description,
                created_at_ms: now,
                updated_at_ms: now,
            };
            tables.projects.insert(id, created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn update_project(&self, id: u64, update: ProjectUpdate) -> BoxFuture<'_, StoreResult<Project>> {
        async move {
            self.enter("update_project").await?;
            if let Some(name) = &update.name {
                required("name", name)?;
            }

            let mut tables = self.tables.write().await;
            let project = tables
                .projects
                .get_mut(&id)
                .ok_or(StoreError::NotFound { entity: "project", id })?;
            if let Some(name) = update.name {
                project.name = name;
            }
            if let Some(description) = update.description {
                project.description = Some(description);
            }
            project.updated_at_ms = now_ms();
            Ok(project.clone())
        }
        .boxed()
    }

    fn delete_project(&self, id: u64) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            self.enter("delete_project").await?;
            let mut tables = self.tables.write().await;
            tables
                .projects
                .remove(&id)
                .ok_or(StoreError::NotFound { entity: "project", id })?;
            tables.tasks.retain(|_, t| t.project_id != id);
            Ok(())
        }
        .boxed()
    }

    fn tasks_by_project(
        &self,
        project_id: u64,
        pending_only: bool,
    ) -> BoxFuture<'_, StoreResult<Vec<Task>>> {
        async move {
            self.enter("tasks_by_project").await?;
            let tables = self.tables.read().await;
            if !tables.projects.contains_key(&project_id) {
                return Err(StoreError::NotFound { entity: "project", id: project_id });
            }
            Ok(tables
                .tasks
                .values()
                .filter(|t| t.project_id == project_id && !(pending_only && t.completed))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn list_tasks(&self) -> BoxFuture<'_, StoreResult<Vec<Task>>> {
        async move {
            self.enter("list_tasks").await?;
            Ok(self.tables.read().await.tasks.values().cloned().collect())
        }
        .boxed()
    }

    fn get_task(&self, id: u64) -> BoxFuture<'_, StoreResult<Task>> {
        async move {
            self.enter("get_task").await?;
            self.tables
                .read()
                .await
                .tasks
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound { entity: "task", id })
        }
        .boxed()
    }

    fn create_task(&self, task: NewTask) -> BoxFuture<'_, StoreResult<Task>> {
        async move {
            self.enter("create_task").await?;
            required("title", &task.title)?;

            let mut tables = self.tables.write().await;
            if !tables.users.contains_key(&task.user_id) {
                return Err(StoreError::Invalid(format!("user {} does not exist", task.user_id)));
            }
            if !tables.projects.contains_key(&task.project_id) {
                return Err(StoreError::Invalid(format!(
                    "project {} does not exist",
                    task.project_id
                )));
            }
            let id = tables.next_id();
            let now = now_ms();
            let created = Task {
                id,
                title: task.title,
                completed: false,
                user_id: task.user_id,
                project_id: task.project_id,
                created_at_ms: now,
                updated_at_ms: now,
            };
            tables.tasks.insert(id, created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn update_task(&self, id: u64, update: TaskUpdate) -> BoxFuture<'_, StoreResult<Task>> {
        async move {
            self.enter("update_task").await?;
            if let Some(title) = &update.title {
                required("title", title)?;
            }

            let mut tables = self.tables.write().await;
            if let Some(user_id) = update.user_id.filter(|u| !tables.users.contains_key(u)) {
                return Err(StoreError::Invalid(format!("user {} does not exist", user_id)));
            }
            if let Some(project_id) = update.project_id.filter(|p| !tables.projects.contains_key(p)) {
                return Err(StoreError::Invalid(format!("project {} does not exist", project_id)));
            }

            let task = tables
                .tasks
                .get_mut(&id)
                .ok_or(StoreError::NotFound { entity: "task", id })?;
            if let Some(title) = update.title {
                task.title = title;
            }
            if let Some(completed) = update.completed {
                task.completed = completed;
            }
            if let Some(user_id) = update.user_id {
                task.user_id = user_id;
            }
            if let Some(project_id) = update.project_id {
                task.project_id = project_id;
            }
            task.updated_at_ms = now_ms();
            Ok(task.clone())
        }
        .boxed()
    }

    fn delete_task(&self, id: u64) -> BoxFuture<'_, StoreResult<()>> {
        async move {
            self.enter("delete_task").await?;
            self.tables
                .write()
                .await
                .tasks
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound { entity: "task", id })
        }
        .boxed()
    }

    fn statistics(&self) -> BoxFuture<'_, StoreResult<Vec<ProjectStatistics>>> {
        async move {
            self.enter("statistics").await?;
            let tables = self.tables.read().await;
            Ok(tables.projects.values().map(|p| stats_for(p, &tables.tasks)).collect())
        }
        .boxed()
    }

    fn project_statistics(&self, project_id: u64) -> BoxFuture<'_, StoreResult<ProjectStatistics>> {
        async move {
            self.enter("project_statistics").await?;
            let tables = self.tables.read().await;
            tables
                .projects
                .get(&project_id)
                .map(|p| stats_for(p, &tables.tasks))
                .ok_or(StoreError::NotFound { entity: "project", id: project_id })
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'_, StoreResult<()>> {
        async move { self.enter("ping").await }.boxed()
    }
}
