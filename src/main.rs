use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use perfolizer::agent::{router, AgentServer, ServerOptions};
use perfolizer::config::{load_agent_config, resolve_agent_config_path};
use perfolizer::error::{AgentError, AppError, AppResult};
use perfolizer::logger;

#[derive(Parser, Debug)]
#[command(
    name = "perfolizer-agent",
    version,
    about = "Perfolizer execution agent: runs test plans and serves metrics"
)]
struct AgentArgs {
    /// Config file path (overrides PERFOLIZER_AGENT_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen host override.
    #[arg(long)]
    listen_host: Option<String>,

    /// Listen port override.
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("agent failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> AppResult<()> {
    let args = AgentArgs::parse();
    logger::init_logging(args.verbose);

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(resolve_agent_config_path);
    let mut config = load_agent_config(&config_path).map_err(AppError::config)?;

    if let Some(listen_host) = args.listen_host {
        config.listen_host = listen_host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().map_err(AppError::config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let addr = config.listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|err| {
                AppError::agent(AgentError::Bind {
                    addr: addr.clone(),
                    source: err,
                })
            })?;

        info!(
            "Perfolizer agent listening on {} (config: {})",
            addr,
            config_path.display()
        );

        let server = AgentServer::new(ServerOptions::from(&config));
        let app = router(server).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app).await?;
        Ok(())
    })
}
