//! Core of the packrun server: foreground command execution, the background
//! script classifier, and the supervised background task registry.
//!
//! Everything here is transport-agnostic; the MCP facade in
//! `packrun-mcp-server` is just a caller.

pub mod background;
mod command_label;
pub mod error;
pub mod exec;
pub mod project;
pub mod shutdown;
mod signal;
pub mod task_manager;

pub use background::should_auto_detect_background;
pub use command_label::command_line_for_display;
pub use error::ProjectError;
pub use error::TaskError;
pub use exec::ExecParams;
pub use exec::execute;
pub use project::PackageManager;
pub use project::ProjectContext;
pub use project::timeout_for_script;
pub use task_manager::BackgroundTaskManager;
