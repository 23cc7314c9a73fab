// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::chain_config::ChainConfig;
use crate::load_config::{find_in_parent, resolve_config_path, ConfigSource};
use crate::registry::{ContractRegistry, RegistryError};
use crate::yaml::load_yaml_with_env;
use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const DEFAULT_CONFIG_NAME: &str = "ctoken.config.yaml";
pub const ENV_PREFIX: &str = "CTOKEN_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    /// Gateway endpoint. When absent an in-process coprocessor is used, which only local
    /// networks accept.
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 30_000,
        }
    }
}

impl RelayerConfig {
    pub fn url(&self) -> Result<Option<Url>> {
        self.url
            .as_deref()
            .map(|u| Url::parse(u).with_context(|| format!("Invalid relayer url `{u}`")))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecryptionConfig {
    /// Chain the decryption authorization is verified on. Defaults to the host chain.
    pub gateway_chain_id: Option<u64>,
    pub verifying_contract: Address,
    pub default_duration_days: u64,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            gateway_chain_id: None,
            verifying_contract: Address::ZERO,
            default_duration_days: 10,
        }
    }
}

/// The config actually used throughout the app
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub relayer: RelayerConfig,
    pub decryption: DecryptionConfig,
    pub chains: Vec<ChainConfig>,
    #[serde(skip)]
    config_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn chains(&self) -> &[ChainConfig] {
        &self.chains
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    pub fn chain(&self, chain_id: u64) -> Result<&ChainConfig, RegistryError> {
        self.chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .ok_or(RegistryError::UnknownChain(chain_id))
    }

    pub fn chain_by_name(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn registry(&self) -> ContractRegistry {
        ContractRegistry::from_chains(&self.chains)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                bail!("Chain id {} is configured more than once", chain.chain_id);
            }
            chain.rpc_url()?;
        }
        if self.decryption.default_duration_days == 0 {
            bail!("decryption.default_duration_days must be at least 1");
        }
        self.relayer.url()?;
        Ok(())
    }
}

/// Layer defaults, the yaml file and `CTOKEN_` environment variables, in that order
pub fn load_config_from(source: &ConfigSource) -> Result<AppConfig> {
    let loaded_yaml = match load_yaml_with_env(source.path()) {
        Ok(yaml) => yaml,
        Err(err) if !source.is_required() => {
            debug!("No configuration at {}: {err}", source.path().display());
            String::new()
        }
        Err(err) => {
            return Err(err).context(format!(
                "Configuration file {} not found",
                source.path().display()
            ))
        }
    };

    let mut config: AppConfig = Figment::from(Serialized::defaults(&AppConfig::default()))
        .merge(Yaml::string(&loaded_yaml))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["private_key"]))
        .extract()
        .context("Could not parse configuration")?;

    config.validate()?;
    config.config_file = Some(source.path().to_path_buf());
    Ok(config)
}

pub fn load_config(cli_file: Option<&Path>) -> Result<AppConfig> {
    let source = resolve_config_path(
        find_in_parent,
        &env::current_dir()?,
        &OsDirs::config_dir()?,
        DEFAULT_CONFIG_NAME,
        cli_file,
    );
    debug!("Using configuration {:?}", source);
    load_config_from(&source)
}

pub struct OsDirs;
impl OsDirs {
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("ctoken"))
            .context("ctoken may only be run on an OS that can provide a config dir. See https://docs.rs/dirs for more information.")
    }
}
