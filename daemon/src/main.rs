//! Bastion daemon: entry point for bootstrapping a node.

use std::path::PathBuf;

use anyhow::Context;
use bastion_node::{
    init_logging, load_genesis, load_or_create_node_key, node_id, Bootstrap, BootstrapDeps,
    LogFormat, NodeConfig, ShutdownController, TeardownRegistry,
};
use clap::Parser;

/// File looked up under the root directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Parser)]
#[command(name = "bastion-daemon", about = "Bastion node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BASTION_CONFIG")]
    config: Option<PathBuf>,

    /// Node root directory; relative paths in the config resolve under it.
    #[arg(long, env = "BASTION_ROOT_DIR")]
    root_dir: Option<PathBuf>,

    /// Generate missing node key and admin client credentials.
    #[arg(long, env = "BASTION_AUTOGEN")]
    autogen: bool,

    /// Admin service listen address (`host:port`, `https://host:port` or a
    /// unix socket path).
    #[arg(long, env = "BASTION_ADMIN_LISTEN_ADDRESS")]
    admin_listen_address: Option<String>,

    /// Serve the admin service without TLS on non-loopback addresses.
    #[arg(long, env = "BASTION_ADMIN_NOTLS")]
    admin_notls: bool,

    /// Skip the `pg_dump`/`psql` version checks.
    #[arg(long, env = "BASTION_SKIP_DEPENDENCY_CHECK")]
    skip_dependency_check: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "BASTION_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error", or a filter
    /// directive.
    #[arg(long, env = "BASTION_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Bootstrap the node and run until SIGINT/SIGTERM.
    Run,
    /// Write a default config file and node key under the root directory.
    Init,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = match self.config_path() {
            Some(path) => NodeConfig::from_toml_file(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => NodeConfig::default(),
        };
        if let Some(root_dir) = &self.root_dir {
            config.root_dir = root_dir.clone();
        }
        if let Some(addr) = &self.admin_listen_address {
            config.app.admin_listen_address = addr.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.app.autogen |= self.autogen;
        config.app.admin_notls |= self.admin_notls;
        config.app.skip_dependency_check |= self.skip_dependency_check;
        Ok(config)
    }

    /// `--config`, else `config.toml` under `--root-dir` when it exists.
    fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        let candidate = self.root_dir.as_ref()?.join(DEFAULT_CONFIG_FILE);
        candidate.exists().then_some(candidate)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let format: LogFormat = config.logging.format.parse()?;
    init_logging(format, &config.logging.level)?;

    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Run => run(config).await?,
            NodeAction::Init => init(config)?,
        },
    }

    Ok(())
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    tracing::info!(
        root_dir = %config.root_dir.display(),
        state_sync = config.chain.state_sync.enable,
        admin = %config.app.admin_listen_address,
        "starting bastion node"
    );

    let genesis = load_genesis(&config.genesis_path())?;
    let node_key = load_or_create_node_key(&config.private_key_path(), config.app.autogen)?;
    tracing::info!(chain_id = %genesis.chain_id, node_id = %node_id(&node_key)?, "node identity loaded");

    let deps = BootstrapDeps::postgres(&config)?;
    let mut output = Bootstrap::new(&config, &genesis, &node_key, deps).run().await?;

    if let Some(anchor) = &output.trust_anchor {
        tracing::info!(%anchor, providers = output.state_sync_providers.len(), "state sync anchored");
    }
    tracing::info!(
        restored = output.restored,
        peers = output.whitelist.len(),
        admin = %output.admin.endpoint.listen_address(),
        admin_tls = ?output.admin.mode,
        "bootstrap complete"
    );

    let shutdown = ShutdownController::new();
    shutdown.wait_for_signal().await;

    tracing::info!("shutdown signal received, releasing resources");
    release(&mut output.teardown);
    tracing::info!("bastion daemon exited");
    Ok(())
}

/// Run every registered closer. Failures are logged and never change the
/// exit status.
fn release(teardown: &mut TeardownRegistry) {
    if let Err(error) = teardown.teardown_all() {
        tracing::error!(%error, failures = error.failures.len(), "teardown finished with errors");
    }
}

fn init(config: NodeConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.root_dir)
        .with_context(|| format!("creating {}", config.root_dir.display()))?;

    let config_path = config.root_dir.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    std::fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    let node_key = load_or_create_node_key(&config.private_key_path(), true)?;
    tracing::info!(
        config = %config_path.display(),
        node_id = %node_id(&node_key)?,
        "node initialised"
    );
    Ok(())
}
