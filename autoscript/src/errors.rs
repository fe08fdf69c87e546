use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Script load error: {0}")]
    ScriptLoad(String),

    #[error("Focus failed: {0}")]
    FocusFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
