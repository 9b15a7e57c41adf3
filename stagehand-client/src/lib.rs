//! Stagehand warehouse sessions
//!
//! Everything the engine sends to the remote task runner goes through
//! [`WarehouseSession`]. Sessions are passed explicitly to every operation;
//! nothing caches one.
//!
//! Two implementations are provided:
//! - [`HttpSession`]: posts rendered statements to the warehouse SQL API
//! - [`MemorySession`]: applies statements to an in-memory model and records
//!   every call, for local dry runs and tests
//!
//! # Example
//!
//! ```no_run
//! use stagehand_client::{ConnectionSettings, HttpSession, WarehouseSession};
//! use stagehand_core::{ObjectName, Statement};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = ConnectionSettings::new("https://account.example.com", "token", "COMPUTE_WH");
//!     let session = HttpSession::new(settings)?;
//!
//!     session
//!         .execute(&Statement::ExecuteTask(ObjectName::root("de_pipeline", None)))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod http;
mod memory;

pub use error::{Result, SessionError};
pub use http::{ConnectionSettings, HttpSession};
pub use memory::{Call, MemorySession};

use async_trait::async_trait;
use stagehand_core::Statement;
use std::path::Path;

/// Connection to the remote warehouse
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Executes one statement
    ///
    /// # Errors
    /// Returns an error if the request fails or the warehouse rejects the
    /// statement. Nothing is retried.
    async fn execute(&self, statement: &Statement) -> Result<()>;

    /// Uploads a local file to a stage, overwriting any file of the same name
    ///
    /// # Arguments
    /// * `path` - Local file to upload
    /// * `stage` - Target stage, e.g. `@my_stage`
    async fn put_file(&self, path: &Path, stage: &str) -> Result<()>;
}
