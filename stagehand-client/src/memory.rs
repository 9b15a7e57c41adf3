//! In-memory warehouse session
//!
//! Applies statements to a small model of the task runner: tasks and
//! procedures keyed by name (create-or-replace), stage files, resumed tasks
//! and requested executions. References are checked the way the warehouse
//! checks them, so a task naming a predecessor that does not exist yet is
//! rejected. Every call is recorded, rejected ones included.

use async_trait::async_trait;
use stagehand_core::statement::{CreateProcedure, CreateTask};
use stagehand_core::{ObjectName, Statement};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::WarehouseSession;
use crate::error::{Result, SessionError};

type StatementPredicate = Box<dyn Fn(&Statement) -> bool + Send + Sync>;

/// One recorded session call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Execute(Statement),
    Put { path: PathBuf, stage: String },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    tasks: BTreeMap<ObjectName, CreateTask>,
    procedures: BTreeMap<ObjectName, CreateProcedure>,
    stages: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    resumed: BTreeSet<ObjectName>,
    dependents_enabled: BTreeSet<ObjectName>,
    runs: Vec<ObjectName>,
    fail_when: Vec<StatementPredicate>,
    fail_uploads: bool,
}

/// Warehouse session backed by memory
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct MemorySession {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemorySession")
            .field("calls", &state.calls.len())
            .field("tasks", &state.tasks.len())
            .field("procedures", &state.procedures.len())
            .finish()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only happens if a test panicked mid-call; the model is
    // still readable.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rejects every later statement matching `predicate`
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&Statement) -> bool + Send + Sync + 'static,
    {
        self.lock().fail_when.push(Box::new(predicate));
    }

    /// Rejects every later stage upload
    pub fn fail_uploads(&self) {
        self.lock().fail_uploads = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Statements sent so far, accepted or not
    pub fn statements(&self) -> Vec<Statement> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute(statement) => Some(statement.clone()),
                Call::Put { .. } => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn task(&self, name: &ObjectName) -> Option<CreateTask> {
        self.lock().tasks.get(name).cloned()
    }

    pub fn task_names(&self) -> Vec<ObjectName> {
        self.lock().tasks.keys().cloned().collect()
    }

    pub fn procedure(&self, name: &ObjectName) -> Option<CreateProcedure> {
        self.lock().procedures.get(name).cloned()
    }

    pub fn procedure_names(&self) -> Vec<ObjectName> {
        self.lock().procedures.keys().cloned().collect()
    }

    /// File names currently on `stage`
    pub fn stage_files(&self, stage: &str) -> Vec<String> {
        self.lock()
            .stages
            .get(stage)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stage_file(&self, stage: &str, file_name: &str) -> Option<Vec<u8>> {
        self.lock()
            .stages
            .get(stage)
            .and_then(|files| files.get(file_name).cloned())
    }

    pub fn is_resumed(&self, name: &ObjectName) -> bool {
        self.lock().resumed.contains(name)
    }

    pub fn dependents_enabled(&self, name: &ObjectName) -> bool {
        self.lock().dependents_enabled.contains(name)
    }

    /// Tasks an execution was requested for, in request order
    pub fn runs(&self) -> Vec<ObjectName> {
        self.lock().runs.clone()
    }
}

impl State {
    fn require_task(&self, statement: &Statement, name: &ObjectName) -> Result<()> {
        if self.tasks.contains_key(name) {
            Ok(())
        } else {
            Err(SessionError::rejected(
                statement,
                format!("task {name} does not exist"),
            ))
        }
    }

    fn apply(&mut self, statement: &Statement) -> Result<()> {
        if self.fail_when.iter().any(|predicate| predicate(statement)) {
            return Err(SessionError::rejected(
                statement,
                format!("{} on {} refused", statement.kind(), statement.target()),
            ));
        }

        match statement {
            Statement::CreateTask(task) => {
                if let Some(missing) = task.after.iter().find(|p| !self.tasks.contains_key(*p)) {
                    return Err(SessionError::rejected(
                        statement,
                        format!("predecessor task {missing} does not exist"),
                    ));
                }
                // Replacing a task suspends it
                self.resumed.remove(&task.name);
                self.tasks.insert(task.name.clone(), task.clone());
            }
            Statement::CreateProcedure(procedure) => {
                self.procedures
                    .insert(procedure.name.clone(), procedure.clone());
            }
            Statement::ForceRunTask(name) | Statement::ExecuteTask(name) => {
                self.require_task(statement, name)?;
                self.runs.push(name.clone());
            }
            Statement::EnableTaskDependents(name) => {
                self.require_task(statement, name)?;
                self.dependents_enabled.insert(name.clone());
            }
            Statement::ResumeTask(name) => {
                self.require_task(statement, name)?;
                self.resumed.insert(name.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseSession for MemorySession {
    async fn execute(&self, statement: &Statement) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::Execute(statement.clone()));
        state.apply(statement)
    }

    async fn put_file(&self, path: &Path, stage: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SessionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SessionError::InvalidConfig(format!("{} has no file name", path.display()))
            })?
            .to_string();

        let mut state = self.lock();
        state.calls.push(Call::Put {
            path: path.to_path_buf(),
            stage: stage.to_string(),
        });
        if state.fail_uploads {
            return Err(SessionError::api_error(
                403,
                format!("upload to {stage} refused"),
            ));
        }
        state
            .stages
            .entry(stage.to_string())
            .or_default()
            .insert(file_name, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::statement::{Schedule, TaskBody};

    fn create(name: &str, after: &[&str]) -> Statement {
        Statement::CreateTask(CreateTask {
            name: ObjectName::new(name),
            warehouse: "WH".to_string(),
            schedule: if after.is_empty() {
                Some(Schedule::idle())
            } else {
                None
            },
            after: after.iter().map(|a| ObjectName::new(*a)).collect(),
            body: TaskBody::Noop,
        })
    }

    #[tokio::test]
    async fn test_create_or_replace_keeps_one_task() {
        let session = MemorySession::new();
        session.execute(&create("START_p", &[])).await.unwrap();
        session.execute(&create("START_p", &[])).await.unwrap();

        assert_eq!(session.task_names(), vec![ObjectName::new("START_p")]);
        assert_eq!(session.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_predecessor_is_rejected() {
        let session = MemorySession::new();
        let result = session.execute(&create("task_p_b", &["task_p_a"])).await;

        assert!(matches!(result, Err(SessionError::Rejected { .. })));
        assert!(session.task_names().is_empty());
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_control_statements_track_state() {
        let session = MemorySession::new();
        let root = ObjectName::new("START_p");
        session.execute(&create("START_p", &[])).await.unwrap();

        session
            .execute(&Statement::EnableTaskDependents(root.clone()))
            .await
            .unwrap();
        session
            .execute(&Statement::ResumeTask(root.clone()))
            .await
            .unwrap();
        session
            .execute(&Statement::ExecuteTask(root.clone()))
            .await
            .unwrap();

        assert!(session.dependents_enabled(&root));
        assert!(session.is_resumed(&root));
        assert_eq!(session.runs(), vec![root.clone()]);

        // Replacing suspends again
        session.execute(&create("START_p", &[])).await.unwrap();
        assert!(!session.is_resumed(&root));
    }

    #[tokio::test]
    async fn test_force_run_of_unknown_task_is_rejected() {
        let session = MemorySession::new();
        let result = session
            .execute(&Statement::ForceRunTask(ObjectName::new("task_p_a")))
            .await;
        assert!(result.is_err());
        assert!(session.runs().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let session = MemorySession::new();
        session.fail_when(|s| matches!(s, Statement::CreateTask(t) if t.name.name == "START_p"));

        assert!(session.execute(&create("START_p", &[])).await.is_err());
        assert!(session.execute(&create("START_q", &[])).await.is_ok());
    }

    #[tokio::test]
    async fn test_put_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.zip");
        std::fs::write(&path, b"one").unwrap();

        let session = MemorySession::new();
        session.put_file(&path, "@my_stage").await.unwrap();
        std::fs::write(&path, b"two").unwrap();
        session.put_file(&path, "@my_stage").await.unwrap();

        assert_eq!(session.stage_files("@my_stage"), vec!["helper.zip"]);
        assert_eq!(
            session.stage_file("@my_stage", "helper.zip"),
            Some(b"two".to_vec())
        );
    }

    #[tokio::test]
    async fn test_failed_upload_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("helper.zip");
        std::fs::write(&path, b"one").unwrap();

        let session = MemorySession::new();
        session.fail_uploads();

        assert!(session.put_file(&path, "@my_stage").await.is_err());
        assert!(session.stage_files("@my_stage").is_empty());
        assert_eq!(session.calls().len(), 1);
    }
}
