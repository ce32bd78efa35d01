// twin-fabric-config/src/lib.rs
// ============================================================================
// Module: Twin Fabric Configuration
// Description: Runtime configuration value and environment parsing.
// Purpose: Keep environment access at the host edge; the router only ever
//          sees the parsed struct.
// Dependencies: serde, twin-fabric-core
// ============================================================================

//! ## Overview
//! [`RuntimeConfig`] carries everything the router needs that is not part of
//! the scenario: connector mode, live-write allowances, the operation
//! blocklist, alias pack selections, twin error rates, the default seed, and
//! the artifacts directory. `from_env` reads the `VEI_*` variables; only the
//! CLI and the SDK call it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use twin_fabric_core::FabricError;

/// Default session seed.
pub const DEFAULT_SEED: u64 = 42_042;

// ============================================================================
// SECTION: Connector Mode
// ============================================================================

/// Adapter selection for the connector runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMode {
    /// Execute against the in-memory twins.
    #[default]
    Sim,
    /// Memoize twin responses by canonical request key.
    Replay,
    /// Live shell; currently delegates to sim.
    Live,
}

impl ConnectorMode {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sim => "sim",
            Self::Replay => "replay",
            Self::Live => "live",
        }
    }

    /// Parses a mode name, defaulting to `sim` for unknown or empty input.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("").trim().to_lowercase().as_str() {
            "replay" => Self::Replay,
            "live" => Self::Live,
            _ => Self::Sim,
        }
    }
}

// ============================================================================
// SECTION: Runtime Config
// ============================================================================

/// Parsed host configuration for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Default session seed.
    pub seed: u64,
    /// Artifacts directory for trace/receipt files.
    pub artifacts_dir: Option<PathBuf>,
    /// Connector adapter mode.
    pub connector_mode: ConnectorMode,
    /// Whether live mode may execute safe writes.
    pub live_allow_write_safe: bool,
    /// Whether live mode may execute risky writes.
    pub live_allow_write_risky: bool,
    /// Blocked `service.operation` identifiers.
    pub blocked_operations: BTreeSet<String>,
    /// ERP alias packs to register.
    pub erp_alias_packs: Vec<String>,
    /// CRM alias packs to register.
    pub crm_alias_packs: Vec<String>,
    /// Injected fault rate for ERP invoice/payment operations.
    pub erp_error_rate: f64,
    /// Injected consent-violation rate for CRM outreach.
    pub crm_error_rate: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            artifacts_dir: None,
            connector_mode: ConnectorMode::Sim,
            live_allow_write_safe: false,
            live_allow_write_risky: false,
            blocked_operations: BTreeSet::new(),
            erp_alias_packs: vec!["xero".to_string()],
            crm_alias_packs: vec!["hubspot".to_string(), "salesforce".to_string()],
            erp_error_rate: 0.0,
            crm_error_rate: 0.0,
        }
    }
}

impl RuntimeConfig {
    /// Builds the configuration from the `VEI_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seed: env_var("VEI_SEED")
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_SEED),
            artifacts_dir: env_var("VEI_ARTIFACTS_DIR").map(PathBuf::from),
            connector_mode: ConnectorMode::parse(env_var("VEI_CONNECTOR_MODE").as_deref()),
            live_allow_write_safe: parse_bool(env_var("VEI_LIVE_ALLOW_WRITE_SAFE").as_deref()),
            live_allow_write_risky: parse_bool(env_var("VEI_LIVE_ALLOW_WRITE_RISKY").as_deref()),
            blocked_operations: parse_csv(env_var("VEI_LIVE_BLOCK_OPS").as_deref())
                .into_iter()
                .collect(),
            erp_alias_packs: env_var("VEI_ALIAS_PACKS")
                .map(|raw| parse_csv(Some(&raw)))
                .unwrap_or(defaults.erp_alias_packs),
            crm_alias_packs: env_var("VEI_CRM_ALIAS_PACKS")
                .map(|raw| parse_csv(Some(&raw)))
                .unwrap_or(defaults.crm_alias_packs),
            erp_error_rate: parse_rate(env_var("VEI_ERP_ERROR_RATE").as_deref()),
            crm_error_rate: parse_rate(env_var("VEI_CRM_ERROR_RATE").as_deref()),
        }
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `config.invalid` when a rate is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), FabricError> {
        for (name, rate) in [
            ("erp_error_rate", self.erp_error_rate),
            ("crm_error_rate", self.crm_error_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FabricError::new(
                    "config.invalid",
                    format!("{name} must be within [0, 1], got {rate}"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Reads one environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

/// Parses a boolean flag the way the connector config documents it.
fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.unwrap_or("").trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Splits a comma-separated list, dropping empty entries.
fn parse_csv(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses a float rate, collapsing malformed input to zero.
fn parse_rate(raw: Option<&str>) -> f64 {
    raw.and_then(|raw| raw.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn mode_parsing_defaults_to_sim() {
        assert_eq!(ConnectorMode::parse(None), ConnectorMode::Sim);
        assert_eq!(ConnectorMode::parse(Some("LIVE")), ConnectorMode::Live);
        assert_eq!(ConnectorMode::parse(Some("replay")), ConnectorMode::Replay);
        assert_eq!(ConnectorMode::parse(Some("banana")), ConnectorMode::Sim);
    }

    #[test]
    fn boolean_flags_accept_the_documented_spellings() {
        for truthy in ["1", "true", "YES", "on"] {
            assert!(parse_bool(Some(truthy)), "{truthy}");
        }
        for falsy in ["0", "false", "", "off"] {
            assert!(!parse_bool(Some(falsy)), "{falsy}");
        }
    }

    #[test]
    fn csv_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_csv(Some(" xero , netsuite ,, ")),
            vec!["xero".to_string(), "netsuite".to_string()]
        );
        assert!(parse_csv(None).is_empty());
    }

    #[test]
    fn rate_validation_bounds_the_interval() {
        let mut config = RuntimeConfig::default();
        config.validate().unwrap();
        config.erp_error_rate = 1.5;
        assert_eq!(config.validate().unwrap_err().code, "config.invalid");
    }

    #[test]
    fn defaults_match_the_documented_packs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.erp_alias_packs, vec!["xero".to_string()]);
        assert_eq!(
            config.crm_alias_packs,
            vec!["hubspot".to_string(), "salesforce".to_string()]
        );
    }
}
