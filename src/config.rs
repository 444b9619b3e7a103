//! Fee configuration for attempt construction
//!
//! Loads fee floors and ceilings from TOML files with environment variable
//! substitution. The [`FeeConfig`] trait is the capability the attempt
//! builder consumes; [`FeeSettings`] is its file-backed implementation.

use crate::price::Wei;

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Capability exposing the fee bounds the builder validates against
pub trait FeeConfig: Send + Sync {
    /// Whether new attempts default to the dynamic fee-market type
    fn eip1559_dynamic_fees(&self) -> bool;
    /// Global tip cap floor for dynamic attempts
    fn tip_cap_min(&self) -> Wei;
    /// Global gas price floor for legacy attempts
    fn price_min(&self) -> Wei;
    /// Gas price ceiling for a specific source address
    fn price_max_key(&self, key: Address) -> Wei;
}

/// Fee bounds configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeSettings {
    pub eip1559_dynamic_fees: bool,
    pub price_min: Wei,
    pub tip_cap_min: Wei,
    pub price_max_default: Wei,
    /// Per-source-address ceiling overrides, keyed by 0x-prefixed address
    #[serde(default)]
    pub price_max_keys: HashMap<String, Wei>,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            eip1559_dynamic_fees: true,
            price_min: Wei::from_gwei(1),
            tip_cap_min: Wei::from_wei(1u64),
            price_max_default: Wei::from_gwei(500),
            price_max_keys: HashMap::new(),
        }
    }
}

impl FeeSettings {
    /// Load settings from a TOML file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fee config file: {:?}", path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let mut settings: FeeSettings =
            toml::from_str(&config_str).with_context(|| "Failed to parse fee configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate bounds and normalize override keys
    fn validate(&mut self) -> Result<()> {
        if self.price_min > self.price_max_default {
            anyhow::bail!(
                "price_min ({}) exceeds price_max_default ({})",
                self.price_min,
                self.price_max_default
            );
        }
        if self.tip_cap_min > self.price_max_default {
            anyhow::bail!(
                "tip_cap_min ({}) exceeds price_max_default ({})",
                self.tip_cap_min,
                self.price_max_default
            );
        }

        let mut normalized = HashMap::with_capacity(self.price_max_keys.len());
        for (key, ceiling) in self.price_max_keys.drain() {
            let address: Address = key
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid address key {key:?}: {e}"))?;
            if ceiling < self.price_min {
                anyhow::bail!(
                    "ceiling override {} for key {} is below price_min {}",
                    ceiling,
                    key,
                    self.price_min
                );
            }
            normalized.insert(format!("{address:?}"), ceiling);
        }
        self.price_max_keys = normalized;

        Ok(())
    }
}

impl FeeConfig for FeeSettings {
    fn eip1559_dynamic_fees(&self) -> bool {
        self.eip1559_dynamic_fees
    }

    fn tip_cap_min(&self) -> Wei {
        self.tip_cap_min
    }

    fn price_min(&self) -> Wei {
        self.price_min
    }

    fn price_max_key(&self, key: Address) -> Wei {
        self.price_max_keys
            .get(&format!("{key:?}"))
            .copied()
            .unwrap_or(self.price_max_default)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
