use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linetalk")]
#[command(about = "LINE webhook relay to the A3RT Talk API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file (credentials are normally supplied via environment or .env).
    Init {
        /// Config file path (default: LINETALK_CONFIG_PATH or ~/.linetalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the webhook server (GET /, POST /callback, POST /talk).
    Serve {
        /// Config file path (default: LINETALK_CONFIG_PATH or ~/.linetalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long, short)]
        bind: Option<String>,
    },

    /// Send one query to the Talk API and print the reply.
    Talk {
        /// Config file path (default: LINETALK_CONFIG_PATH or ~/.linetalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Text to send.
        query: String,
    },

    /// Print the x-line-signature for a payload file, for hand-crafted webhook requests.
    Sign {
        /// Config file path (default: LINETALK_CONFIG_PATH or ~/.linetalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// File holding the exact request body.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("failed to load .env: {}", e),
    }

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linetalk {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Talk { config, query }) => {
            if let Err(e) = run_talk(config, query).await {
                log::error!("talk failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Sign { config, file }) => {
            if let Err(e) = run_sign(config, file) {
                log::error!("sign failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    if lib::config::init_config(&path)? {
        println!("wrote default config to {}", path.display());
    } else {
        println!("config already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(b) = bind {
        config.server.bind = b;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.server.bind,
        config.server.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

async fn run_talk(config_path: Option<PathBuf>, query: String) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let (api_key, api_url) = config.require_talk()?;
    let client = lib::talk::TalkClient::new(api_key, api_url)
        .with_timeout(std::time::Duration::from_secs(config.talk.timeout_secs));
    let reply = client.talk(&lib::talk::Query::new(query)).await?;
    println!("{}", reply);
    Ok(())
}

fn run_sign(config_path: Option<PathBuf>, file: PathBuf) -> anyhow::Result<()> {
    use anyhow::Context;

    let (config, _) = lib::config::load_config(config_path)?;
    let secret = config.require_channel_secret()?;
    let body = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    println!("{}", lib::line::sign(&secret, &body));
    Ok(())
}
