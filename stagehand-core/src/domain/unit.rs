//! Scheduled unit domain types
//!
//! A compiled pipeline is one [`RootUnit`] plus one [`ScheduledUnit`] per
//! node. Unit and callable names are pure functions of the pipeline name and
//! the node (or function) name, so repeated compiles always address the same
//! remote objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::statement::{CreateTask, Invocation, Schedule, Statement, TaskBody, quote_identifier};

/// Database and schema qualifying every remote object of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub schema: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
        }
    }
}

/// Possibly qualified name of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    /// Qualifies the name with `namespace`, or leaves it bare when `None`
    pub fn qualified(name: impl Into<String>, namespace: Option<&Namespace>) -> Self {
        let mut object = Self::new(name);
        if let Some(ns) = namespace {
            object.database = Some(ns.database.clone());
            object.schema = Some(ns.schema.clone());
        }
        object
    }

    /// Name of the task a node compiles into
    pub fn task(pipeline: &str, node: &str, namespace: Option<&Namespace>) -> Self {
        Self::qualified(format!("task_{pipeline}_{node}"), namespace)
    }

    /// Name of the pipeline's synthetic root task
    pub fn root(pipeline: &str, namespace: Option<&Namespace>) -> Self {
        Self::qualified(format!("START_{pipeline}"), namespace)
    }

    /// Name of the callable registered for a node function
    pub fn procedure(pipeline: &str, function: &str, namespace: Option<&Namespace>) -> Self {
        Self::qualified(format!("{pipeline}_{function}_sproc"), namespace)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{}.", quote_identifier(database))?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", quote_identifier(schema))?;
        }
        write!(f, "{}", quote_identifier(&self.name))
    }
}

/// Synthetic anchor task of a pipeline
///
/// It has no predecessors and an idle schedule; it exists so entry nodes
/// always have something to run `AFTER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootUnit {
    pub unit_name: ObjectName,
    pub schedule: Schedule,
}

impl RootUnit {
    pub fn to_statement(&self, warehouse: &str) -> Statement {
        Statement::CreateTask(CreateTask {
            name: self.unit_name.clone(),
            warehouse: warehouse.to_string(),
            schedule: Some(self.schedule.clone()),
            after: Vec::new(),
            body: TaskBody::Noop,
        })
    }
}

/// Remote task compiled from one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledUnit {
    pub node: String,
    pub unit_name: ObjectName,
    pub runs_after: Vec<ObjectName>,
    pub invocation: Invocation,
}

impl ScheduledUnit {
    pub fn to_statement(&self, warehouse: &str) -> Statement {
        Statement::CreateTask(CreateTask {
            name: self.unit_name.clone(),
            warehouse: warehouse.to_string(),
            schedule: None,
            after: self.runs_after.clone(),
            body: TaskBody::Call(self.invocation.clone()),
        })
    }
}
