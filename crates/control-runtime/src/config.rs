//! Runtime configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde_json::Value;

use shared_types::Role;

/// Full process configuration.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SYNAPSE_DATA_DIR` | `./data` | Journals and receipt chain location |
/// | `SYNAPSE_BIND_ADDR` | `127.0.0.1:7341` | Operator gateway bind address |
/// | `SYNAPSE_OPS_SECRET` | (required) | HMAC secret for signatures/receipts |
/// | `SYNAPSE_VENUE_ACCOUNT` | `main` | Account for flatten orders |
/// | `SYNAPSE_OPERATORS` | `` | Roster, `id:role` comma-separated |
/// | `SYNAPSE_SNAPSHOT_INTERVAL_SECS` | `60` | Replay snapshot cadence |
/// | `SYNAPSE_EPHEMERAL` | `false` | Skip journals entirely (dev only) |
/// | `SYNAPSE_CFG_<key>` | (unset) | Env provenance layer; `__` maps to `.` |
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub ops_secret: String,
    pub venue_account: String,
    pub operators: HashMap<String, Role>,
    pub snapshot_interval_secs: u64,
    pub ephemeral: bool,
    /// Env provenance layer for the config registry.
    pub config_env_layer: HashMap<String, Value>,
}

impl RuntimeConfig {
    /// Load from the environment.
    ///
    /// # Errors
    ///
    /// A description of the first missing or malformed variable.
    pub fn from_env() -> Result<Self, String> {
        let ops_secret = env::var("SYNAPSE_OPS_SECRET")
            .map_err(|_| "SYNAPSE_OPS_SECRET is required".to_string())?;
        if ops_secret.len() < 16 {
            return Err("SYNAPSE_OPS_SECRET must be at least 16 bytes".to_string());
        }

        let bind_addr = env::var("SYNAPSE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:7341".to_string())
            .parse()
            .map_err(|e| format!("SYNAPSE_BIND_ADDR invalid: {e}"))?;

        let operators = parse_roster(&env::var("SYNAPSE_OPERATORS").unwrap_or_default())?;

        let snapshot_interval_secs = match env::var("SYNAPSE_SNAPSHOT_INTERVAL_SECS") {
            Err(_) => 60,
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|v| *v >= 1)
                .ok_or_else(|| format!("SYNAPSE_SNAPSHOT_INTERVAL_SECS invalid: {raw}"))?,
        };

        Ok(Self {
            data_dir: env::var("SYNAPSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            bind_addr,
            ops_secret,
            venue_account: env::var("SYNAPSE_VENUE_ACCOUNT").unwrap_or_else(|_| "main".to_string()),
            operators,
            snapshot_interval_secs,
            ephemeral: env::var("SYNAPSE_EPHEMERAL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            config_env_layer: collect_env_layer(env::vars()),
        })
    }
}

/// Parse `id:role,id:role` into a roster.
fn parse_roster(raw: &str) -> Result<HashMap<String, Role>, String> {
    let mut roster = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, role) = entry
            .split_once(':')
            .ok_or_else(|| format!("SYNAPSE_OPERATORS entry {entry:?} is not id:role"))?;
        let role = Role::parse(role.trim())
            .ok_or_else(|| format!("SYNAPSE_OPERATORS entry {entry:?} has unknown role"))?;
        roster.insert(id.trim().to_string(), role);
    }
    Ok(roster)
}

/// Collect `SYNAPSE_CFG_risk__maxPositionNotional=25000` style variables
/// into the env provenance layer. Values parse as JSON when they can and
/// fall back to strings.
fn collect_env_layer(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, Value> {
    vars.filter_map(|(name, raw)| {
        let key = name.strip_prefix("SYNAPSE_CFG_")?.replace("__", ".");
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        Some((key, value))
    })
    .collect()
}
