mod plugins;
mod server;
mod stdio;

use anyhow::{Context, Result};
use clap::Parser;
use imserver_core::config::ServerConfig;
use imserver_core::{FileSettings, ManagerContext, MemorySettings, PluginManager, SettingsBackend};
use plugins::ManifestLoader;
use server::Server;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stdio::{Output, StdioConnection};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Input method server speaking JSON lines on stdin and stdout
#[derive(Parser, Debug)]
#[command(name = "imserver", version, about)]
struct Cli {
    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file, defaults to <config dir>/imserver/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance number appended to the service name
    #[arg(long)]
    instance_id: Option<u32>,

    /// Do not claim the well-known service name
    #[arg(long)]
    no_bus_service: bool,

    /// Directory scanned for plugin manifests
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// File persisting the settings; settings are kept in memory otherwise
    #[arg(long)]
    settings_file: Option<PathBuf>,

    /// The process was restarted by its supervisor
    #[arg(long)]
    respawned: bool,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(id) = self.instance_id {
            config.instance_id = id;
        }
        if self.no_bus_service {
            config.no_bus_service = true;
        }
        if let Some(dir) = &self.plugin_dir {
            config.plugin_dir = dir.clone();
        }
        if let Some(file) = &self.settings_file {
            config.settings_file = Some(file.clone());
        }
        if self.respawned {
            config.respawned = true;
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("imserver").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return Ok(ServerConfig::default()),
    };
    if !path.exists() {
        log::debug!("No configuration at {}, using defaults", path.display());
        return Ok(ServerConfig::default());
    }

    let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn open_settings(config: &ServerConfig) -> Result<Box<dyn SettingsBackend>> {
    match &config.settings_file {
        Some(path) => {
            let settings = FileSettings::open(path)
                .with_context(|| format!("Failed to open settings file {}", path.display()))?;
            Ok(Box::new(settings))
        }
        None => Ok(Box::new(MemorySettings::new())),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Starting {} (settings app {})", config.service_name(), config.settings_app_id());

    let output = Output::new(std::io::stdout());
    let context = ManagerContext::new(
        open_settings(&config)?,
        Box::new(ManifestLoader::new()),
        Box::new(StdioConnection::new(output.clone())),
    )
    .with_config(config);
    let manager = PluginManager::new(context).context("Failed to start the plugin manager")?;
    log::info!("Active plugins: {:?}", manager.active_plugin_names());

    let mut server = Server::new(manager, output);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read from stdin")? {
                    Some(line) => server.handle_line(&line).context("Stopping the server")?,
                    None => {
                        log::info!("Input closed");
                        break;
                    }
                }
            }
            _ = sleep_until(server.next_deadline()) => {
                if server.poll_timers() {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    run(config).await
}
