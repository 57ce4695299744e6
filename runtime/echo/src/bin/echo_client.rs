use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use courier_echo::parse_arg;
use courier_fabric::codec::SerializerKind;
use courier_fabric::transport::UnixTransportBuilder;
use courier_fabric::{ClientOptions, ClientProxy, Value};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:9222")]
    pub addr: std::net::SocketAddr,

    /// Connect to this Unix socket instead of TCP.
    #[arg(long)]
    pub unix: Option<PathBuf>,

    /// Attempts before giving up.
    #[arg(long, default_value = "3")]
    pub retries: usize,

    /// Use protobuf instead of bincode.
    #[arg(long, default_value_t = false)]
    pub protobuf: bool,

    /// Log level.
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,

    /// Service name.
    pub service: String,

    /// Method name.
    pub method: String,

    /// Method arguments; numbers, booleans and `null` keep their type.
    pub args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let options = ClientOptions {
        host: args.addr.ip().to_string(),
        port: args.addr.port(),
        retries: args.retries,
        serializer: if args.protobuf {
            SerializerKind::Protobuf
        } else {
            SerializerKind::Bincode
        },
        ..ClientOptions::default()
    };
    let call_args: Vec<Value> = args.args.iter().map(|a| parse_arg(a)).collect();

    let result = match &args.unix {
        Some(path) => {
            let connector = UnixTransportBuilder::new()
                .path(path)
                .connect_timeout(options.connect_timeout);
            ClientProxy::with_connector(connector, &options)
                .call(&args.service, &args.method, call_args)
                .await
        }
        None => {
            ClientProxy::new(&options)
                .call(&args.service, &args.method, call_args)
                .await
        }
    };

    match result {
        Ok(value) => {
            println!("{:?}", value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "call failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
