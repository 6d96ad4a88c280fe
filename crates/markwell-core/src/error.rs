//! Error types for integration and configuration faults.

use crate::surface::SurfaceId;
use thiserror::Error;

/// Errors raised synchronously at the call site that needed missing context.
///
/// These describe integration mistakes (a surface that was never registered,
/// a surface without a tool group). Races with teardown are not errors; they
/// are logged and skipped where they happen.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InteractionError {
    #[error("Surface not registered: {0}")]
    UnknownSurface(SurfaceId),
    #[error("Surface has no enabled rendering context: {0}")]
    SurfaceDisabled(SurfaceId),
    #[error("No tool group bound to surface: {0}")]
    ToolGroupNotFound(SurfaceId),
    #[error("Tool not registered in group {group}: {tool}")]
    UnknownTool { group: String, tool: String },
    #[error("Tool group not found: {0}")]
    UnknownToolGroup(String),
    #[error("Tool group already exists: {0}")]
    DuplicateToolGroup(String),
    #[error("Render scheduler has been destroyed")]
    SchedulerDestroyed,
}

/// Result type for interaction operations.
pub type InteractionResult<T> = Result<T, InteractionError>;
