use thiserror::Error;

/// Unified error type for auto-deploy operations
#[derive(Error, Debug)]
pub enum AutoDeployError {
    #[error("Version parsing error: {0}")]
    Parse(String),

    #[error("Component not found: {component} at {commit}")]
    ComponentNotFound { component: String, commit: String },

    #[error("Unable to find a version for package `{0}`")]
    VersionNotFound(String),

    #[error("Unable to find lockfile `{0}`")]
    LockfileNotFound(String),

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Invalid auto-deploy branch: {0}")]
    Branch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled before {0}")]
    Cancelled(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience type alias for Results in git-autodeploy
pub type Result<T> = std::result::Result<T, AutoDeployError>;

impl AutoDeployError {
    /// Create a version parse error with context
    pub fn parse(msg: impl Into<String>) -> Self {
        AutoDeployError::Parse(msg.into())
    }

    pub fn component_not_found(component: impl Into<String>, commit: impl Into<String>) -> Self {
        AutoDeployError::ComponentNotFound {
            component: component.into(),
            commit: commit.into(),
        }
    }

    /// Create an error for a repository or ref that cannot be reached
    pub fn unavailable(msg: impl Into<String>) -> Self {
        AutoDeployError::RemoteUnavailable(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        AutoDeployError::AlreadyExists(msg.into())
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        AutoDeployError::Remote(msg.into())
    }

    pub fn branch(msg: impl Into<String>) -> Self {
        AutoDeployError::Branch(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        AutoDeployError::Config(msg.into())
    }

    pub fn cancelled(step: impl Into<String>) -> Self {
        AutoDeployError::Cancelled(step.into())
    }

    /// True for the idempotent-success class of remote errors
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AutoDeployError::AlreadyExists(_))
    }

    /// True when the target repository, branch or ref could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AutoDeployError::RemoteUnavailable(_))
    }

    /// Short status label used in structured log fields
    pub fn status(&self) -> &'static str {
        match self {
            AutoDeployError::Parse(_) => "parse_error",
            AutoDeployError::ComponentNotFound { .. } => "component_not_found",
            AutoDeployError::VersionNotFound(_) => "version_not_found",
            AutoDeployError::LockfileNotFound(_) => "lockfile_not_found",
            AutoDeployError::RemoteUnavailable(_) => "not_found",
            AutoDeployError::AlreadyExists(_) => "already_exists",
            AutoDeployError::Remote(_) => "remote_error",
            AutoDeployError::Branch(_) => "invalid_branch",
            AutoDeployError::Config(_) | AutoDeployError::Toml(_) => "config_error",
            AutoDeployError::Cancelled(_) => "cancelled",
            AutoDeployError::Git(_) => "git_error",
            AutoDeployError::Io(_) => "io_error",
            AutoDeployError::Yaml(_) => "yaml_error",
            AutoDeployError::Json(_) => "json_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoDeployError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoDeployError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert_eq!(err.status(), "io_error");
    }

    #[test]
    fn test_component_not_found_names_component_and_commit() {
        let err = AutoDeployError::component_not_found("GITALY_SERVER_VERSION", "abc123");
        let msg = err.to_string();
        assert!(msg.contains("GITALY_SERVER_VERSION"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn test_version_not_found_message() {
        let err = AutoDeployError::VersionNotFound("mail_room".to_string());
        assert_eq!(
            err.to_string(),
            "Unable to find a version for package `mail_room`"
        );
    }

    #[test]
    fn test_classification_helpers() {
        assert!(AutoDeployError::already_exists("tag v1").is_already_exists());
        assert!(!AutoDeployError::remote("boom").is_already_exists());
        assert!(AutoDeployError::unavailable("gitlab-org/cng").is_unavailable());
        assert!(!AutoDeployError::parse("x").is_unavailable());
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (AutoDeployError::config("x"), "Configuration error"),
            (AutoDeployError::parse("x"), "Version parsing error"),
            (AutoDeployError::remote("x"), "Remote operation failed"),
            (AutoDeployError::unavailable("x"), "Remote unavailable"),
            (AutoDeployError::branch("x"), "Invalid auto-deploy branch"),
            (AutoDeployError::cancelled("tagging"), "Operation cancelled"),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
