//! Worker configuration shared by projects and the events they own.

use super::ParseLogLevelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Verbosity requested of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Everything, including diagnostic detail.
    Debug,
    /// Normal progress messages.
    #[default]
    Info,
    /// Warnings and errors only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl TryFrom<&str> for LogLevel {
    type Error = ParseLogLevelError;

    fn try_from(value: &str) -> Result<Self, ParseLogLevelError> {
        match value.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(ParseLogLevelError(value.to_owned())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container settings for the worker pod.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSpec {
    /// Image reference; the controller default applies when empty.
    pub image: String,
    /// Pull policy; the controller default applies when empty.
    pub image_pull_policy: String,
    /// Whitespace-separated command line; the image entrypoint runs when
    /// empty.
    pub command: String,
    /// Extra environment variables.
    pub environment: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// Splits [`ContainerSpec::command`] into program and arguments.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        self.command.split_whitespace().map(str::to_owned).collect()
    }
}

/// Source checkout settings for the worker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerGitConfig {
    /// Repository URL; no checkout happens when empty.
    #[serde(rename = "cloneURL")]
    pub clone_url: String,
    /// Commit to check out.
    pub commit: String,
    /// Branch or tag to check out when no commit is given.
    pub r#ref: String,
    /// Whether submodules are initialised after cloning.
    pub init_submodules: bool,
}

/// Cluster settings for the worker pod.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerKubernetesConfig {
    /// Names of image pull secrets in the project namespace.
    pub image_pull_secrets: Vec<String>,
}

/// Cluster settings applied to every job a worker launches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobsKubernetesConfig {
    /// Names of image pull secrets in the project namespace.
    pub image_pull_secrets: Vec<String>,
}

/// Policy for the jobs a worker may launch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobsSpec {
    /// Whether job containers may run privileged.
    pub allow_privileged: bool,
    /// Whether job containers may mount the host's Docker socket.
    pub allow_docker_socket_mount: bool,
    /// Cluster settings for job pods.
    pub kubernetes: JobsKubernetesConfig,
}

/// Everything needed to run a worker for one event.
///
/// Projects hold a template; each event receives a resolved copy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSpec {
    /// Worker container settings.
    pub container: ContainerSpec,
    /// Requested workspace volume size, for example `10Gi`.
    pub workspace_size: String,
    /// Source checkout settings.
    pub git: WorkerGitConfig,
    /// Cluster settings for the worker pod.
    pub kubernetes: WorkerKubernetesConfig,
    /// Job policy.
    pub jobs: JobsSpec,
    /// Worker verbosity.
    pub log_level: LogLevel,
    /// Directory, relative to the checkout, holding worker config files.
    pub config_files_directory: String,
    /// Config files supplied inline, keyed by file name.
    pub default_config_files: BTreeMap<String, String>,
}
