use std::net::SocketAddr;

use clap::Parser;
use echo_target::EchoTarget;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve `POST /work`, echoing each item back.
#[derive(Debug, Parser)]
#[command(name = "echo-target", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "ECHO_ADDR", default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Fraction of requests answered with 503, within [0, 1].
    #[arg(long, env = "ECHO_ERROR_RATE", default_value_t = 0.0)]
    error_rate: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();
    let args = Args::parse();

    let default_log_filter = "info,echo_target=info";
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter)),
        )
        .init();
    if dotenv_loaded {
        info!(".env file loaded successfully.");
    }

    let server = EchoTarget::bind(args.addr, args.error_rate).await?;
    info!(
        addr = %server.local_addr()?,
        error_rate = args.error_rate,
        "Echo target listening."
    );

    tokio::select! {
        _ = server.serve() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down.");
        }
    }

    Ok(())
}
