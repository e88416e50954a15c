//! CLI configuration: thin wrapper around `pmlink_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--endpoint, --model, --timeout, --auto-reboot).

use std::time::Duration;

use url::Url;

use pmlink_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use pmlink_config::{
    Config, Profile, config_path, load_config_or_default, parse_endpoint, parse_model,
    save_config_to,
};

/// Everything needed to build and attach an engine.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Name of the profile the settings came from, if any.
    pub profile_name: Option<String>,
    pub engine: EngineConfig,
    pub endpoint: Option<Url>,
}

impl Resolved {
    /// The endpoint, or an error pointing at how to configure one.
    pub fn require_endpoint(&self) -> Result<&Url, CliError> {
        self.endpoint.as_ref().ok_or(CliError::NoEndpoint)
    }
}

/// Resolve the active profile plus flag overrides.
///
/// An explicitly named profile must exist. Without one, the file's default
/// profile is used when present and the global defaults otherwise.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    resolve_with(&cfg, global)
}

pub fn resolve_with(cfg: &Config, global: &GlobalOpts) -> Result<Resolved, CliError> {
    let found = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => Some((name.to_owned(), profile)),
        Err(_) if global.profile.is_none() => None,
        Err(_) => {
            return Err(CliError::ProfileNotFound {
                name: global.profile.clone().unwrap_or_default(),
                available: available_profiles(cfg),
            });
        }
    };

    let mut engine = match &found {
        Some((_, profile)) => pmlink_config::profile_to_engine_config(profile, &cfg.defaults)?,
        None => pmlink_config::defaults_to_engine_config(&cfg.defaults)?,
    };

    // Flags and env beat the profile.
    if let Some(ref model) = global.model {
        engine.profile = parse_model(model)?.profile();
    }
    if global.auto_reboot {
        engine.auto_reboot = true;
    }
    if let Some(millis) = global.timeout {
        if millis == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }
        engine.command_timeout = Duration::from_millis(millis);
    }

    let raw_endpoint = global
        .endpoint
        .as_deref()
        .or_else(|| found.as_ref().map(|(_, p)| p.endpoint.as_str()))
        .filter(|s| !s.is_empty());
    let endpoint = raw_endpoint.map(parse_endpoint).transpose()?;

    Ok(Resolved {
        profile_name: found.map(|(name, _)| name),
        engine,
        endpoint,
    })
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
