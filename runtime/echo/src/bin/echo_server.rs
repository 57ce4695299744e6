use std::path::PathBuf;

use clap::Parser;
use courier_echo::{counter_service, echo_service, COUNTER, ECHO};
use courier_fabric::transport::UnixTransportListener;
use courier_fabric::Server;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listen address.
    #[arg(default_value = "127.0.0.1:9222")]
    pub addr: std::net::SocketAddr,

    /// Serve on this Unix socket instead of TCP.
    #[arg(long)]
    pub unix: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> courier_fabric::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut server = Server::new();
    server
        .register(ECHO, echo_service())
        .register(COUNTER, counter_service());

    let stop = server.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            stop.stop();
        }
    });

    match args.unix {
        Some(path) => {
            let listener = UnixTransportListener::bind(&path).await?;
            tracing::info!(path = %path.display(), "start listening");
            server.serve(listener).await
        }
        None => server.run(args.addr).await,
    }
}
