//! Config command implementation.

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::{Config, key_name};
use crate::util::AppContext;

pub fn cmd_config(ctx: &AppContext, action: ConfigAction) -> Result<()> {
    let path = Config::path();

    match action {
        ConfigAction::Show => {
            let content =
                toml::to_string_pretty(&ctx.config).context("Failed to serialize config")?;
            print!("{}", content);
            if ctx.config.database.is_none() {
                println!("# database = {:?} (default)", ctx.db_path.display().to_string());
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            Config::default().save()?;
            ctx.note(&format!("Created {}", path.display()));
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, &value)?;
            config.save()?;
            ctx.note(&format!("Set {} = {}", key_name(key), value));
        }
    }
    Ok(())
}
