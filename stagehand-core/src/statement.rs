//! Remote statement AST
//!
//! Every call the compiler, registry and trigger make against the warehouse is
//! expressed as a [`Statement`]. Statements stay typed until the session
//! boundary, where they are rendered through [`std::fmt::Display`]. Quoting of
//! identifiers and string literals happens only here and in [`crate::literal`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::definition::Value;
use crate::domain::unit::ObjectName;
use crate::literal::{quote_string, render_args};

/// Schedule of the root task, in minutes
pub const IDLE_SCHEDULE_MINUTES: u32 = 11_520;

/// Renders an identifier, double-quoting it unless it is a plain identifier
pub fn quote_identifier(ident: &str) -> String {
    if is_plain_identifier(ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Recurring task schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub minutes: u32,
}

impl Schedule {
    /// Long-period schedule for tasks that are resumed or executed by hand
    pub fn idle() -> Self {
        Self {
            minutes: IDLE_SCHEDULE_MINUTES,
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{} MINUTE'", self.minutes)
    }
}

/// A call of a registered callable with literal arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub callable: ObjectName,
    pub args: Vec<Value>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CALL {}({})", self.callable, render_args(&self.args))
    }
}

/// What a task runs when it fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskBody {
    Call(Invocation),
    /// Placeholder body of the root task
    Noop,
}

impl fmt::Display for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Call(invocation) => write!(f, "{invocation}"),
            TaskBody::Noop => write!(f, "SELECT 1"),
        }
    }
}

/// `CREATE OR REPLACE TASK`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub name: ObjectName,
    pub warehouse: String,
    pub schedule: Option<Schedule>,
    pub after: Vec<ObjectName>,
    pub body: TaskBody,
}

/// `CREATE OR REPLACE PROCEDURE` for a node function
///
/// The signature is fixed by the node calling convention:
/// `(input_data ARRAY, output_data ARRAY, is_local BOOLEAN) -> STRING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProcedure {
    pub name: ObjectName,
    pub language: String,
    pub runtime_version: String,
    pub packages: Vec<String>,
    pub imports: Vec<String>,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    CreateTask(CreateTask),
    CreateProcedure(CreateProcedure),
    ForceRunTask(ObjectName),
    EnableTaskDependents(ObjectName),
    ResumeTask(ObjectName),
    ExecuteTask(ObjectName),
}

impl Statement {
    /// The remote object this statement acts on
    pub fn target(&self) -> &ObjectName {
        match self {
            Statement::CreateTask(task) => &task.name,
            Statement::CreateProcedure(procedure) => &procedure.name,
            Statement::ForceRunTask(name)
            | Statement::EnableTaskDependents(name)
            | Statement::ResumeTask(name)
            | Statement::ExecuteTask(name) => name,
        }
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateTask(_) => "create task",
            Statement::CreateProcedure(_) => "create procedure",
            Statement::ForceRunTask(_) => "force run",
            Statement::EnableTaskDependents(_) => "enable dependents",
            Statement::ResumeTask(_) => "resume task",
            Statement::ExecuteTask(_) => "execute task",
        }
    }
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| quote_string(item))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTask(task) => {
                writeln!(f, "CREATE OR REPLACE TASK {}", task.name)?;
                writeln!(f, "  WAREHOUSE = {}", quote_identifier(&task.warehouse))?;
                if let Some(schedule) = &task.schedule {
                    writeln!(f, "  SCHEDULE = {schedule}")?;
                }
                if !task.after.is_empty() {
                    let after: Vec<String> = task.after.iter().map(ToString::to_string).collect();
                    writeln!(f, "  AFTER {}", after.join(", "))?;
                }
                writeln!(f, "AS")?;
                write!(f, "  {}", task.body)
            }
            Statement::CreateProcedure(procedure) => {
                writeln!(
                    f,
                    "CREATE OR REPLACE PROCEDURE {}(INPUT_DATA ARRAY, OUTPUT_DATA ARRAY, IS_LOCAL BOOLEAN)",
                    procedure.name
                )?;
                writeln!(f, "  RETURNS STRING")?;
                writeln!(f, "  LANGUAGE {}", quote_identifier(&procedure.language))?;
                writeln!(
                    f,
                    "  RUNTIME_VERSION = {}",
                    quote_string(&procedure.runtime_version)
                )?;
                writeln!(f, "  PACKAGES = ({})", quoted_list(&procedure.packages))?;
                writeln!(f, "  IMPORTS = ({})", quoted_list(&procedure.imports))?;
                write!(f, "  HANDLER = {}", quote_string(&procedure.handler))
            }
            Statement::ForceRunTask(name) => write!(
                f,
                "CALL SYSTEM$TASK_FORCE_RUN({})",
                quote_string(&name.to_string())
            ),
            Statement::EnableTaskDependents(name) => write!(
                f,
                "CALL SYSTEM$TASK_DEPENDENTS_ENABLE({})",
                quote_string(&name.to_string())
            ),
            Statement::ResumeTask(name) => write!(f, "ALTER TASK {name} RESUME"),
            Statement::ExecuteTask(name) => write!(f, "EXECUTE TASK {name}"),
        }
    }
}
