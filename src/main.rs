use distributed_fs::config::{NamingConfig, StorageConfig};
use distributed_fs::naming::{NamingServer, RegistrationApi};
use distributed_fs::rpc::Stub;
use distributed_fs::storage::StorageServer;

use std::path::PathBuf;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} naming [--service <addr:port>] [--registration <addr:port>]",
        program
    );
    eprintln!(
        "       {} storage --root <dir> [--hostname <host>] [--naming <host>]",
        program
    );
    eprintln!("Example: {} naming", program);
    eprintln!(
        "Example: {} storage --root /srv/dfs --hostname 10.0.0.5 --naming 10.0.0.1",
        program
    );

    std::process::exit(1);
}

/// Value following the flag at `args[i]`.
fn flag_value(args: &[String], i: usize) -> anyhow::Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", args[i]))
}

fn log_level() -> tracing::Level {
    std::env::var("DFS_LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::Level::INFO)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(log_level()).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
    }

    match args[1].as_str() {
        "naming" => run_naming(&args).await,
        "storage" => run_storage(&args).await,
        _ => usage(&args[0]),
    }
}

async fn run_naming(args: &[String]) -> anyhow::Result<()> {
    let mut config = NamingConfig::from_env()?;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--service" => {
                config.service_addr = flag_value(args, i)?.parse()?;
                i += 2;
            }
            "--registration" => {
                config.registration_addr = flag_value(args, i)?.parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let server = NamingServer::new(&config)?;
    server.start().await?;

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    server.stop().await;
    Ok(())
}

async fn run_storage(args: &[String]) -> anyhow::Result<()> {
    let mut root: Option<PathBuf> = None;
    let mut hostname: Option<String> = None;
    let mut naming_host: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--root" => {
                root = Some(PathBuf::from(flag_value(args, i)?));
                i += 2;
            }
            "--hostname" => {
                hostname = Some(flag_value(args, i)?.to_string());
                i += 2;
            }
            "--naming" => {
                naming_host = Some(flag_value(args, i)?.to_string());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let mut config = StorageConfig::from_env(root)?;
    if let Some(hostname) = hostname {
        config.hostname = hostname;
    }
    if let Some(naming_host) = naming_host {
        config.naming_host = naming_host;
    }

    tracing::info!(
        "Starting storage server on {} (naming server {}:{})",
        config.root.display(),
        config.naming_host,
        config.registration_port
    );

    let registration =
        Stub::<RegistrationApi>::resolve(&config.naming_host, config.registration_port).await?;
    let server = StorageServer::new(&config)?;
    server.start(&config.hostname, &registration).await?;

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    server.stop().await;
    Ok(())
}
