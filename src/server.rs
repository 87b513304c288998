//! The development server.
//!
//! Two listeners are started:
//! 1. An HTTP server (`axum` + `tower-http`) serving the output directory.
//! 2. A websocket server on a dedicated thread (`tungstenite`) keeping the
//!    connections of open browser tabs. The injected client script reloads
//!    the page whenever a `"reload"` message arrives.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use axum::Router;
use console::style;
use tower_http::services::ServeDir;
use tracing::info;
use tungstenite::WebSocket;

use crate::config::ServerConfig;
use crate::env::Environment;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Oldest tabs are closed beyond this many connections.
const MAX_CLIENTS: usize = 10;

/// Addresses the server ended up listening on.
#[derive(Debug, Clone, Copy)]
pub struct DevServer {
    pub http: SocketAddr,
    pub reload: SocketAddr,
}

/// Binds both listeners and connects the reload trigger of `env`.
///
/// Returns once the sockets are bound; serving continues in the background
/// for the rest of the process.
pub async fn start(config: &ServerConfig, env: &Environment) -> std::io::Result<DevServer> {
    let tcp = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], config.reload_port)))?;
    let reload = tcp.local_addr()?;

    let clients = Arc::new(Mutex::new(vec![]));
    let _thread_i = new_thread_ws_incoming(tcp, clients.clone());
    let (tx_reload, _thread_o) = new_thread_ws_reload(clients);
    env.set_reload(tx_reload);

    let address = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(address).await?;
    let http = listener.local_addr()?;

    let router = Router::new()
        // path to the output directory
        .fallback_service(ServeDir::new(&config.base_dir));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("HTTP server stopped: {e}");
        }
    });

    info!(url = %style(format!("http://localhost:{}/", http.port())).yellow(), "serving {}", config.base_dir);
    info!("live reload listening on {reload}");

    Ok(DevServer { http, reload })
}

fn new_thread_ws_incoming(server: TcpListener, clients: Clients) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for stream in server.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!("live reload connection failed: {e}");
                    continue;
                }
            };

            match tungstenite::accept(stream) {
                Ok(socket) => clients
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(socket),
                Err(e) => tracing::debug!("rejected live reload client: {e}"),
            }
        }
    })
}

fn new_thread_ws_reload(clients: Clients) -> (Sender<()>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();

    let thread = std::thread::spawn(move || {
        while rx.recv().is_ok() {
            let mut clients = clients
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            clients.retain_mut(send_reload);

            let excess = clients.len().saturating_sub(MAX_CLIENTS);
            for mut socket in clients.drain(..excess) {
                socket.close(None).ok();
            }

            tracing::debug!("reloaded {} browser tabs", clients.len());
        }
    });

    (tx, thread)
}

/// Tells one tab to reload. A client that can't be reached is forgotten.
fn send_reload(socket: &mut WebSocket<TcpStream>) -> bool {
    match socket.send("reload".into()) {
        Ok(()) => true,
        Err(e) => {
            let peer = socket.get_ref().peer_addr().ok();
            tracing::debug!(?peer, "dropping live reload client: {e}");
            false
        }
    }
}
