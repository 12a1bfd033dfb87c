use {anyhow::Result, clap::Subcommand, herald_config::HeraldConfig};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the path of the config file in use.
    Path,
    /// Write the effective configuration, command-line overrides included.
    Save,
}

pub fn handle_config(action: ConfigAction, config: &HeraldConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        },
        ConfigAction::Path => {
            println!("{}", herald_config::find_or_default_config_path().display());
        },
        ConfigAction::Save => {
            let path = herald_config::save_config(config)?;
            println!("Saved config to {}", path.display());
        },
    }
    Ok(())
}
