/*!
 * Cirrus CLI - Command Line Interface
 */

use anyhow::{Context, Result};
use cirrus::{
    commands::init::{run_init_wizard, write_default_config},
    config::default_config_path,
    error::{EXIT_FAILURE, EXIT_FATAL, EXIT_SUCCESS},
    logging, CloudClient, CloudConfig, CloudError, ConnectionHook, HookAction, NetworkStatus,
    OperatorCommand,
};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(version, about = "Call device functions and read device variables through the cloud API", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.cirrus/cirrus.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Treat the network as down
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enter and validate cloud credentials (operator command I)
    Setup,

    /// Show the current cloud configuration (operator command G)
    Show,

    /// Remove stored credentials after confirmation (operator command N)
    Clear,

    /// Call a device function
    Call {
        /// Function name
        function: String,

        /// Argument passed as `arg`
        #[arg(default_value = "")]
        argument: String,
    },

    /// Read a device variable
    Get {
        /// Variable name
        variable: String,
    },

    /// Run an operator command by its key: I, G or N (case-insensitive)
    Key {
        /// Command key
        key: OperatorCommand,
    },

    /// Run the network-ready hook once
    Connect,

    /// Write a configuration file
    InitConfig {
        /// Write defaults without prompting
        #[arg(long)]
        defaults: bool,
    },
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            e.downcast_ref::<CloudError>()
                .map(CloudError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(default_config_path);

    if let Commands::InitConfig { defaults } = cli.command {
        let path = config_path.context("Could not determine home directory")?;
        if defaults {
            write_default_config(&path)?;
        } else {
            run_init_wizard(&path)?;
        }
        return Ok(EXIT_SUCCESS);
    }

    let mut config = match (&cli.config, &config_path) {
        (Some(path), _) => CloudConfig::from_file(path)?,
        (None, Some(path)) => CloudConfig::load_or_default(path)?,
        (None, None) => CloudConfig::default(),
    };
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(execute(cli.command, config, cli.offline))
}

async fn execute(command: Commands, config: CloudConfig, offline: bool) -> Result<i32> {
    let network = Arc::new(NetworkStatus::new());
    let client = Arc::new(
        CloudClient::builder(config)
            .connectivity(network.clone())
            .build()?,
    );

    if offline {
        if matches!(command, Commands::Connect) {
            return Err(CloudError::NotConnected.into());
        }
    } else if !matches!(command, Commands::Connect) {
        network.mark_connected();
    }

    match command {
        Commands::Setup => OperatorCommand::Reconfigure.execute(&client).await?,
        Commands::Show => {
            OperatorCommand::ShowConfig.execute(&client).await?;
            println!();
            println!("Operator commands (cirrus key <KEY>):");
            for line in OperatorCommand::help() {
                println!("{}", line);
            }
        }
        Commands::Key { key } => key.execute(&client).await?,
        Commands::Clear => OperatorCommand::ClearConfig.execute(&client).await?,
        Commands::Call { function, argument } => {
            let outcome = client.call_function_outcome(&function, &argument).await;
            if outcome.success {
                println!("{}", outcome.return_value);
            } else {
                report_failure(&function, outcome.error);
                return Ok(EXIT_FAILURE);
            }
        }
        Commands::Get { variable } => {
            let outcome = client.get_variable_outcome(&variable).await;
            if outcome.success {
                println!("{}", outcome.result);
            } else {
                report_failure(&variable, outcome.error);
                return Ok(EXIT_FAILURE);
            }
        }
        Commands::Connect => {
            let hook = ConnectionHook::new(Arc::clone(&client));
            match hook.connected(&network).await? {
                HookAction::Configured { device_id } => {
                    println!("{} device {}", style("Configured").green(), device_id)
                }
                HookAction::Reported { device_id } => {
                    println!("{} for device {}", style("Configured").green(), device_id)
                }
                HookAction::Ignored { connection } => {
                    println!("Connection #{}: nothing to do", connection)
                }
            }
        }
        // written in run() before any client exists
        Commands::InitConfig { .. } => {}
    }

    Ok(EXIT_SUCCESS)
}

fn report_failure(name: &str, error: Option<CloudError>) {
    let reason = error
        .map(|e| format!("{} [{}]", e, e.category()))
        .unwrap_or_else(|| "unknown failure".to_string());
    eprintln!("{} {}: {}", style("Failed:").red().bold(), name, reason);
}
