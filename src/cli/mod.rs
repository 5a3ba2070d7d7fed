pub mod args;

pub use args::{Cli, CliCommand};

use crate::config::Config;
use crate::global;
use anyhow::Result;

pub fn handle_config_command() -> Result<()> {
    let path = global::config_file()?;
    let config = Config::load()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
