use fast_time_server::config::ServerConfig;
use fast_time_server::server::McpServer;
use fast_time_server::{logging, transport};

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_args(std::env::args_os()) {
        Ok(c) => c,
        Err(e) => e.exit(),
    };

    if let Err(e) = logging::init(&config) {
        eprintln!("fast-time-server: cannot initialize logging: {e}");
    }

    let server = McpServer::new(config);
    if let Err(e) = transport::serve(server).await {
        eprintln!("fast-time-server: fatal error: {e}");
        std::process::exit(1);
    }
}
