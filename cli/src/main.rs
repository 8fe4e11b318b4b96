//! `vigil` serves the debugger protocol over stdio or a TCP socket.
//!
//! The process hosts an inspector whose context groups are backed by scripted
//! runtimes. A client opens sessions and issues `Debugger.*` requests; an
//! embedder (or a test) plays the engine by sending `engine` messages that
//! report parsed scripts, statements, exceptions and async tasks.

mod debug;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use debug::serve::{Server, Transport as ServeTransport};
use std::{fs, path::PathBuf};
use vigil_inspector::{ConditionErrorPolicy, InspectorConfig};

/// CLI configuration for vigil.
#[derive(Debug, Parser)]
#[command(author, version, about, name = "vigil")]
struct Opt {
    /// TOML file with inspector limits and policies.
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen for a single client on 127.0.0.1:PORT instead of stdio.
    #[arg(long, value_name = "PORT")]
    tcp: Option<u16>,

    /// Log verbosity; logs go to stderr.
    #[arg(long, env = "VIGIL_LOG", default_value = "warn")]
    log_level: log::LevelFilter,

    /// Script source bytes a context group retains before evicting old sources.
    #[arg(long, value_name = "BYTES")]
    max_collected_scripts_size: Option<usize>,

    /// Pause when a breakpoint condition throws, instead of skipping it.
    #[arg(long)]
    pause_on_condition_error: bool,
}

impl Opt {
    fn inspector_config(&self) -> Result<InspectorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .wrap_err_with(|| format!("could not read {}", path.display()))?;
                toml::from_str(&text)
                    .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?
            }
            None => InspectorConfig::default(),
        };
        if let Some(bytes) = self.max_collected_scripts_size {
            config.max_collected_scripts_size = bytes;
        }
        if self.pause_on_condition_error {
            config.condition_error_policy = ConditionErrorPolicy::Pause;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Opt::parse();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()?;

    let config = args.inspector_config()?;
    log::debug!("inspector configuration: {config:?}");

    let transport = match args.tcp {
        Some(port) => ServeTransport::Tcp(port),
        None => ServeTransport::Stdio,
    };
    Server::new(config).serve(transport)
}
