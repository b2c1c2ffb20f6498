use crate::error::{Result, ToolError};
use crate::store::JsonStore;
use crate::toolbox::ToolOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub description: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub type TaskStore = JsonStore<Vec<Task>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Completed(Task),
    AlreadyDone(Task),
}

impl JsonStore<Vec<Task>> {
    pub async fn add_task(&self, description: &str) -> Result<Task> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ToolError::InvalidArguments(
                "Task description cannot be empty.".to_string(),
            ));
        }
        self.update(|tasks| {
            let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            let task = Task {
                id,
                description: description.to_string(),
                done: false,
                created_at: Utc::now(),
                completed_at: None,
            };
            tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    /// Open tasks ordered by id.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let mut pending: Vec<Task> = self.load().await.into_iter().filter(|t| !t.done).collect();
        pending.sort_by_key(|t| t.id);
        pending
    }

    /// Mark a task done. Completing an already finished task changes nothing.
    pub async fn complete_task(&self, id: u64) -> Result<Completion> {
        self.update(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| ToolError::ExecutionFailed(format!("Task {id} not found.")))?;
            if task.done {
                return Ok(Completion::AlreadyDone(task.clone()));
            }
            task.done = true;
            task.completed_at = Some(Utc::now());
            Ok(Completion::Completed(task.clone()))
        })
        .await
    }
}

#[tracing::instrument(level = "info", skip(store))]
pub(crate) async fn add(store: &TaskStore, description: &str) -> Result<ToolOutcome> {
    let task = store.add_task(description).await?;
    Ok(ToolOutcome::with_data(
        format!("Added task: {}", task.description),
        serde_json::json!({ "task_id": task.id }),
    ))
}

pub(crate) async fn list(store: &TaskStore) -> Result<ToolOutcome> {
    let pending = store.pending_tasks().await;
    if pending.is_empty() {
        return Ok(ToolOutcome::with_data(
            "You have no pending tasks.".to_string(),
            serde_json::json!({ "tasks": [] }),
        ));
    }
    let lines: Vec<String> = pending
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. [Task {}] {}", i + 1, t.id, t.description))
        .collect();
    let noun = if pending.len() == 1 { "task" } else { "tasks" };
    Ok(ToolOutcome::with_data(
        format!("You have {} pending {noun}:\n{}", pending.len(), lines.join("\n")),
        serde_json::json!({ "tasks": pending }),
    ))
}

#[tracing::instrument(level = "info", skip(store))]
pub(crate) async fn complete(store: &TaskStore, id: u64) -> Result<ToolOutcome> {
    match store.complete_task(id).await? {
        Completion::Completed(task) => Ok(ToolOutcome::with_data(
            format!("Completed task: {}", task.description),
            serde_json::json!({ "task_id": task.id }),
        )),
        Completion::AlreadyDone(task) => Ok(ToolOutcome::with_data(
            format!("Task {} is already complete: {}", task.id, task.description),
            serde_json::json!({ "task_id": task.id, "unchanged": true }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> TaskStore {
        JsonStore::new(dir.path().join("tasks.json"))
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_survive_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp);
        assert_eq!(s.add_task("buy milk").await.unwrap().id, 1);
        assert_eq!(s.add_task("call mom").await.unwrap().id, 2);

        let reopened = store(&tmp);
        let tasks = reopened.load().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].description, "call mom");
        assert_eq!(reopened.add_task("walk dog").await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn a_malformed_entry_does_not_erase_good_tasks() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp);
        std::fs::write(
            s.path(),
            r#"[{"id":1,"description":"pay rent","done":false},{"id":"2","description":"x"}]"#,
        )
        .unwrap();

        let loaded = s.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, "pay rent");

        assert_eq!(s.add_task("buy milk").await.unwrap().id, 2);
        let names: Vec<String> = store(&tmp)
            .pending_tasks()
            .await
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(names, vec!["pay rent", "buy milk"]);
    }

    #[tokio::test]
    async fn completing_twice_leaves_state_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp);
        s.add_task("buy milk").await.unwrap();

        assert!(matches!(s.complete_task(1).await.unwrap(), Completion::Completed(_)));
        let after_first = std::fs::read_to_string(s.path()).unwrap();

        let out = complete(&s, 1).await.unwrap();
        assert!(out.message.contains("already complete"));
        assert_eq!(std::fs::read_to_string(s.path()).unwrap(), after_first);
        assert!(s.pending_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_task_and_empty_description_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp);
        assert!(s.complete_task(9).await.is_err());
        assert!(s.add_task("   ").await.is_err());
        assert!(!s.path().exists());
    }

    #[tokio::test]
    async fn listing_shows_pending_only() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp);
        s.add_task("one").await.unwrap();
        s.add_task("two").await.unwrap();
        s.complete_task(1).await.unwrap();

        let out = list(&s).await.unwrap();
        assert_eq!(out.message, "You have 1 pending task:\n1. [Task 2] two");
    }
}
