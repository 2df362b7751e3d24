//! Process-wide settings shared by every service and publisher (§3 Globals).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationError};

/// How the rendered IPVS document is handed to the external `ipvsctl` helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecType {
    /// Run `ipvsctl apply` with the document on stdin, do not write a file.
    ExecOnly,
    /// Write the document to the output file, do not invoke `ipvsctl`.
    FileOnly,
    /// Write the document, then run `ipvsctl apply -f`.
    FileAndExec,
}

impl Default for ExecType {
    fn default() -> Self {
        ExecType::ExecOnly
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecType::ExecOnly => "exec-only",
            ExecType::FileOnly => "file-only",
            ExecType::FileAndExec => "file-and-exec",
        };
        write!(f, "{s}")
    }
}

/// `ipvsctl` invocation settings (§3 Globals).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IpvsctlSettings {
    #[serde(default, rename = "executionType")]
    pub exec_type: ExecType,

    #[serde(default = "default_output_file")]
    #[validate(custom = "validate_output_path")]
    pub file: String,

    #[serde(default = "default_ipvsctl_path", rename = "ipvsctlPath")]
    #[validate(length(min = 1))]
    pub ipvsctl_path: String,
}

fn default_output_file() -> String {
    "/etc/ipvsmesh-ipvsctl.yaml".to_string()
}

fn default_ipvsctl_path() -> String {
    "ipvsctl".to_string()
}

impl Default for IpvsctlSettings {
    fn default() -> Self {
        Self {
            exec_type: ExecType::default(),
            file: default_output_file(),
            ipvsctl_path: default_ipvsctl_path(),
        }
    }
}

/// Top-level `globals` section of the configuration file (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Globals {
    #[serde(default)]
    #[validate(nested)]
    pub ipvsctl: IpvsctlSettings,

    /// Free-form settings map consumed by plugins.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

fn validate_output_path(path: &str) -> Result<(), ValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("output_path_empty"));
    }
    if !trimmed.starts_with('/') && !trimmed.starts_with("./") {
        return Err(ValidationError::new("output_path_invalid_format"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(Globals::default().validate().is_ok());
    }

    #[test]
    fn relative_output_path_without_dot_slash_is_rejected() {
        let mut g = Globals::default();
        g.ipvsctl.file = "relative/path.yaml".to_string();
        assert!(g.validate().is_err());
    }
}
