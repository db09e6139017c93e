//! Top-level `config.yaml`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{DeklError, DeklResult};
use crate::paths::Layout;

/// The `config.yaml` file: selects which host file applies to this machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl RootConfig {
    /// Load `config.yaml`; a missing file is an empty config.
    pub fn load(layout: &Layout) -> DeklResult<Self> {
        let path = layout.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        super::read_yaml(&path)
    }

    pub fn save(&self, layout: &Layout) -> anyhow::Result<()> {
        super::write_yaml(&layout.config_file(), self)
    }

    /// The configured host name.
    pub fn host_name(&self) -> DeklResult<&str> {
        self.host.as_deref().ok_or(DeklError::NoHostConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_has_no_host() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        let config = RootConfig::load(&layout).unwrap();
        assert!(matches!(config.host_name(), Err(DeklError::NoHostConfigured)));
    }

    #[test]
    fn test_host_name() {
        let config: RootConfig = serde_yaml::from_str("host: workstation\n").unwrap();
        assert_eq!(config.host_name().unwrap(), "workstation");
    }
}
