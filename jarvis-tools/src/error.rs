use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("io error: {0}")]
    Io(String),
}

impl ToolError {
    /// The error text without its category prefix, suitable for speaking back to the user.
    pub fn user_message(&self) -> String {
        match self {
            ToolError::UnknownTool(name) => format!("I don't have a tool called {name}."),
            ToolError::InvalidArguments(m)
            | ToolError::Unsupported(m)
            | ToolError::ExecutionFailed(m)
            | ToolError::Io(m) => m.clone(),
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidArguments(e.to_string())
    }
}
