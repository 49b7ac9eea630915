//! Deployment-specific overrides applied to a blueprint before expansion.
//!
//! Overrides come from a deployment settings document and from command-line
//! `name=value` pairs; command-line values are applied last.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blueprint::{Blueprint, TerraformBackend};
use crate::error::{ConfigError, ConfigResult};
use crate::value::{Dict, Value};

/// Backend type used when `--backend-config` does not name one.
pub const DEFAULT_BACKEND_TYPE: &str = "gcs";

/// Overrides for vars and the default backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default)]
    pub vars: Dict,
    #[serde(default, skip_serializing_if = "TerraformBackend::is_empty")]
    pub terraform_backend_defaults: TerraformBackend,
}

fn split_pair(pair: &str) -> ConfigResult<(&str, &str)> {
    pair.split_once('=').ok_or_else(|| ConfigError::InputValue {
        input_key: pair.to_string(),
        cause: format!("{:?} should follow the 'name=value' format", pair),
    })
}

/// Set vars from `name=value` pairs. Values are parsed as YAML scalars, so
/// `count=3` yields a number and `flag=true` a bool.
pub fn set_cli_variables(bp: &mut Blueprint, pairs: &[String]) -> ConfigResult<()> {
    for pair in pairs {
        let (key, raw) = split_pair(pair)?;
        let value: Value = serde_yaml::from_str(raw).map_err(|_| ConfigError::InputValue {
            input_key: key.to_string(),
            cause: format!("unable to convert value {:?} to a known type", raw),
        })?;
        debug!(var = key, "Setting variable from command line");
        bp.vars.insert(key.to_string(), value);
    }
    Ok(())
}

/// Replace the default backend with one built from `key=value` pairs.
///
/// `type=` sets the backend type (default `gcs`); every other key becomes a
/// string configuration entry. No pairs leaves the blueprint unchanged.
pub fn set_backend_config(bp: &mut Blueprint, pairs: &[String]) -> ConfigResult<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    let mut backend = TerraformBackend {
        backend_type: DEFAULT_BACKEND_TYPE.to_string(),
        ..Default::default()
    };
    for pair in pairs {
        match split_pair(pair)? {
            ("type", value) => backend.backend_type = value.to_string(),
            (key, value) => {
                backend
                    .configuration
                    .insert(key.to_string(), Value::string(value));
            }
        }
    }
    bp.terraform_backend_defaults = backend;
    Ok(())
}

/// Apply a deployment settings document: vars are merged key by key and a
/// backend with a type replaces the blueprint's default backend.
pub fn merge_deployment_settings(bp: &mut Blueprint, ds: DeploymentSettings) {
    for (k, v) in ds.vars {
        bp.vars.insert(k, v);
    }
    if !ds.terraform_backend_defaults.backend_type.is_empty() {
        bp.terraform_backend_defaults = ds.terraform_backend_defaults;
    }
}
