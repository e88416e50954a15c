//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output::Renderer;

pub fn handle(args: ConfigArgs, global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            renderer.print(&config::config_path().display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let text = renderer.value(&cfg, |cfg| toml::to_string_pretty(cfg).unwrap_or_default())?;
            renderer.print(&text);
            Ok(())
        }

        ConfigCommand::Init { endpoint, force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            config::parse_endpoint(&endpoint)?;
            if let Some(ref model) = global.model {
                config::parse_model(model)?;
            }
            let cfg = starter_config(endpoint, global);
            config::save_config_to(&cfg, &path)?;

            tracing::info!(path = %path.display(), "configuration written");
            renderer.print(&format!("wrote {}", path.display()));
            Ok(())
        }
    }
}

/// One `default` profile seeded from the global flags.
fn starter_config(endpoint: String, global: &GlobalOpts) -> Config {
    let name = global.profile.clone().unwrap_or_else(|| "default".into());
    let profile = Profile {
        endpoint,
        model: Some(global.model.clone().unwrap_or_else(|| "npm1300".into())),
        auto_reboot: global.auto_reboot.then_some(true),
        command_timeout_ms: global.timeout,
        ..Profile::default()
    };

    let mut cfg = Config {
        default_profile: Some(name.clone()),
        ..Config::default()
    };
    cfg.profiles.insert(name, profile);
    cfg
}
