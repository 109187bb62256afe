//! Environment-provided defaults.
//!
//! A `.env` file in the working directory is loaded first (missing file is
//! fine), then the process environment is read. Command-line flags override
//! anything found here.

use std::env;

pub const ENGINE_CMD_ENV: &str = "VBSIM_ENGINE_CMD";
pub const REFERENCE_CMD_ENV: &str = "VBSIM_REFERENCE_CMD";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    /// External inference executable; the in-process engine is used when unset.
    pub engine_cmd: Option<String>,
    /// Reference tool command line.
    pub reference_cmd: Option<String>,
    /// Log filter directive.
    pub log: Option<String>,
}

impl EnvSettings {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            engine_cmd: get(ENGINE_CMD_ENV),
            reference_cmd: get(REFERENCE_CMD_ENV),
            log: get(crate::logging::LOG_ENV),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_values_are_unset() {
        let vars: HashMap<&str, &str> = [
            (ENGINE_CMD_ENV, "  "),
            (REFERENCE_CMD_ENV, "fabber_exp"),
            ("VBSIM_LOG", "debug"),
        ]
        .into_iter()
        .collect();
        let settings = EnvSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.engine_cmd, None);
        assert_eq!(settings.reference_cmd.as_deref(), Some("fabber_exp"));
        assert_eq!(settings.log.as_deref(), Some("debug"));
    }
}
