//! Config file commands.

use anyhow::Context;

use crate::config::{self, Config};

/// Write a default config file.
pub fn cmd_config_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path().context("Could not determine config directory")?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let path = config::save(&Config::default())?;
    println!("Wrote default configuration to {}", path.display());
    println!("Add your app id and credentials under [credentials].");
    Ok(())
}

/// Print the configuration a run would use.
pub fn cmd_config_show() -> anyhow::Result<()> {
    let config = config::load();
    if let Some(path) = config::config_path() {
        println!("# {}", path.display());
    }
    let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", text);
    Ok(())
}
