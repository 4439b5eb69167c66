//! pki-platform - TLS trust hierarchy provisioning
//!
//! Creates a root CA and a signing intermediate, issues leaf certificates for
//! the hosts of a platform configuration, and packages them into per-host
//! keystores and a platform truststore:
//!
//! ```bash
//! pki-platform ca create --name acme
//! pki-platform certs create --config platform.yaml
//! pki-platform platform generate --config platform.yaml --name staging
//! pki-platform platform purge --names staging
//! ```
//!
//! Cryptography is delegated to the signer and store tools named in
//! `pki-platform.toml`.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pki_platform::commands::{ca, certs, platform, CommandContext, Targets};
use pki_platform::configs::AppConfig;
use pki_platform::external_interface::{CommandSigner, CommandStore};

#[derive(Parser)]
#[command(name = "pki-platform")]
#[command(about = "Provision a CA hierarchy and package keystores and truststores for a platform")]
#[command(version)]
struct Cli {
    /// Application configuration file (TOML)
    #[arg(long, global = true)]
    app_config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage certificate authorities
    #[command(subcommand)]
    Ca(CaCommand),

    /// Manage issued certificates
    #[command(subcommand)]
    Certs(CertsCommand),

    /// Generate and manage platform bundles
    #[command(subcommand)]
    Platform(PlatformCommand),
}

#[derive(Subcommand)]
enum CaCommand {
    /// List CAs; the current one is marked with '*'
    List,
    /// Create a root and intermediate CA and make it current
    Create {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete CAs with everything they issued
    Delete(DeleteArgs),
    /// Select the CA used when --ca is omitted
    SetCurrent {
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum CertsCommand {
    /// Issue certificates for a platform configuration
    Create {
        #[arg(long)]
        ca: Option<String>,
        /// Platform configuration (YAML); a single 'default' identity when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List issued certificates
    List {
        #[arg(long)]
        ca: Option<String>,
    },
    /// Delete issued certificates
    Delete {
        #[arg(long)]
        ca: Option<String>,
        #[command(flatten)]
        targets: DeleteArgs,
    },
    /// Copy issued certificates and the CA chain to a directory
    Export {
        #[arg(long)]
        ca: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
        /// Only these identities
        #[arg(short, long, num_args = 1..)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PlatformCommand {
    /// Run the whole pipeline for a platform configuration
    Generate {
        /// Platform configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,
        /// Platform name; a timestamped name when omitted
        #[arg(short, long)]
        name: Option<String>,
        /// CA to issue from; defaults to the platform name
        #[arg(long)]
        ca: Option<String>,
    },
    /// List generated platforms
    List,
    /// Delete generated platforms
    Purge(DeleteArgs),
}

#[derive(Args)]
struct DeleteArgs {
    #[arg(short, long, num_args = 1.., required_unless_present = "all")]
    names: Vec<String>,
    #[arg(short, long, conflicts_with = "names")]
    all: bool,
    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

impl DeleteArgs {
    fn split(self) -> (Targets, bool) {
        (Targets::from_args(self.names, self.all), self.yes)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "✗ error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.app_config.as_deref())?;
    let signer = CommandSigner::from_config(&config.tools);
    let store = CommandStore::from_config(&config.tools);
    let ctx = CommandContext::open(&config, &signer, &store)?;

    match cli.command {
        Commands::Ca(command) => match command {
            CaCommand::List => ca::handle_list(&ctx),
            CaCommand::Create { name } => ca::handle_create(&ctx, name.as_deref()),
            CaCommand::Delete(args) => {
                let (targets, yes) = args.split();
                ca::handle_delete(&ctx, targets, yes)
            }
            CaCommand::SetCurrent { name } => ca::handle_set_current(&ctx, &name),
        },
        Commands::Certs(command) => match command {
            CertsCommand::Create { ca, config } => {
                certs::handle_create(&ctx, ca.as_deref(), config.as_deref()).map(|_| ())
            }
            CertsCommand::List { ca } => certs::handle_list(&ctx, ca.as_deref()),
            CertsCommand::Delete { ca, targets } => {
                let (targets, yes) = targets.split();
                certs::handle_delete(&ctx, ca.as_deref(), targets, yes)
            }
            CertsCommand::Export { ca, output, names } => {
                certs::handle_export(&ctx, ca.as_deref(), &output, &names)
            }
        },
        Commands::Platform(command) => match command {
            PlatformCommand::Generate { config, name, ca } => {
                platform::handle_generate(&ctx, &config, name.as_deref(), ca.as_deref()).map(|_| ())
            }
            PlatformCommand::List => platform::handle_list(&ctx),
            PlatformCommand::Purge(args) => {
                let (targets, yes) = args.split();
                platform::handle_purge(&ctx, targets, yes)
            }
        },
    }
}
