use std::error::Error;
use std::fmt;

/// Immutable identity + content pair that parameterizes a session. The
/// session depends only on `code`'s exact character sequence; `id` is an
/// opaque key for progress lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Stable id, `type:subtype:variant`.
    pub id: String,
    pub type_id: String,
    pub subtype_id: String,
    pub variant_id: String,
    pub title: String,
    pub code: String,
    pub tags: Vec<String>,
    pub level: Option<u8>,
}

/// A missing id or empty snippet is a bad task definition, fatal at
/// startup rather than a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    MissingTypeId,
    MissingCode,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::MissingTypeId => write!(f, "task type id is required"),
            TaskError::MissingCode => write!(f, "task code is required"),
        }
    }
}

impl Error for TaskError {}

#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub subtype_id: Option<String>,
    pub variant_id: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub level: Option<u8>,
}

impl Task {
    pub fn new(type_id: &str, code: &str, options: TaskOptions) -> Result<Self, TaskError> {
        if type_id.is_empty() {
            return Err(TaskError::MissingTypeId);
        }
        if code.is_empty() {
            return Err(TaskError::MissingCode);
        }

        let subtype_id = options.subtype_id.unwrap_or_else(|| "1".to_string());
        let variant_id = options.variant_id.unwrap_or_else(|| "1".to_string());
        let id = format!("{type_id}:{subtype_id}:{variant_id}");
        let title = options
            .title
            .unwrap_or_else(|| format!("Task {type_id}"));

        Ok(Self {
            id,
            type_id: type_id.to_string(),
            subtype_id,
            variant_id,
            title,
            code: code.to_string(),
            tags: options.tags,
            level: options.level,
        })
    }
}
