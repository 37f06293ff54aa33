//! Operator binary for a media node.
//!
//! Connects, activates with the given license key and pings the service on
//! a fixed interval, logging every message the node sends. Ctrl-C
//! disconnects cleanly.

mod cli;

use std::{error::Error, net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use nodewire::{
    client::{Client, ClientHandler},
    message::{Request, Response},
    state::ConnectionState,
};
use tokio::{select, signal, time::interval};
use tracing::{info, warn};

struct LogHandler;

impl ClientHandler for LogHandler {
    fn process_response(&self, request: Option<&Request>, response: &Response) {
        let method = request.map_or("<unknown>", |req| req.method.as_str());
        match (&response.result, &response.error) {
            (_, Some(error)) => warn!(method, code = error.code, message = %error.message, "request failed"),
            (Some(result), None) => info!(method, %result, "response"),
            (None, None) => info!(method, "empty response"),
        }
    }

    fn process_request(&self, request: &Request) {
        info!(method = %request.method, params = ?request.params, "node request");
    }

    fn on_connection_state_changed(&self, state: ConnectionState) {
        info!(%state, "node connection state");
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "serving metrics");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: SocketAddr) -> Result<(), Box<dyn Error>> {
    warn!(%addr, "built without the metrics feature; ignoring --metrics-addr");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr)?;
    }

    let client = Client::new(cli.host, cli.port, Arc::new(LogHandler));
    client.try_connect().await?;
    client.activate(client.next_request_id(), &cli.license_key);

    let mut state = client.subscribe_state();
    let mut ticker = interval(Duration::from_secs(cli.ping_interval_secs));
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                info!("shutting down");
                break;
            }
            _ = ticker.tick() => client.ping_service(client.next_request_id()),
            changed = state.changed() => {
                if changed.is_err() || !state.borrow_and_update().is_connected() {
                    warn!("connection to node lost");
                    break;
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
