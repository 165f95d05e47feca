//! TCP control listener.
//!
//! The sequencer framework drives the server over a newline-delimited text
//! protocol: `transition_to_buffered <shot-path>`, `transition_to_static
//! <shot-path>`, `abort`. Every request gets one reply line, `ok` or
//! `error: <message>`. Requests are handled strictly one at a time - one
//! cycle runs to completion (or failure) before the next begins - and a
//! failed transition triggers the abort hook before the error is reported,
//! matching the framework's cleanup contract.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing::{error, info, warn};

use kim_core::SequencerClient;

/// Control listener bound to the configured port.
pub struct ControlServer {
    listener: TcpListener,
    client: Arc<dyn SequencerClient>,
}

impl ControlServer {
    /// Bind the listener. Port 0 picks an ephemeral port (used by tests).
    pub async fn bind(port: u16, client: Arc<dyn SequencerClient>) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(addr = %listener.local_addr()?, "control listener bound");
        Ok(Self { listener, client })
    }

    /// Address the listener actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve sequencer connections until the process is interrupted.
    ///
    /// Connections are served one at a time; there is never more than one
    /// cycle in flight.
    pub async fn serve_until_interrupted(self) -> Result<()> {
        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((socket, addr)) => {
                        info!(%addr, "sequencer connected");
                        if self.handle_connection(socket).await {
                            break;
                        }
                        info!(%addr, "sequencer disconnected");
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
                _ = signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Serve one connection. Returns true when an interrupt arrived and
    /// the server should shut down.
    async fn handle_connection(&self, socket: TcpStream) -> bool {
        let (reader, mut writer) = socket.into_split();
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => return false,
                        Err(e) => {
                            warn!(error = %e, "control connection read failed");
                            return false;
                        }
                    };
                    let reply = self.dispatch(line.trim()).await;
                    if let Err(e) = writer.write_all(format!("{reply}\n").as_bytes()).await {
                        warn!(error = %e, "control connection write failed");
                        return false;
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    return true;
                }
            }
        }
    }

    async fn dispatch(&self, request: &str) -> String {
        let (verb, arg) = match request.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (request, ""),
        };

        let result = match verb {
            "transition_to_buffered" if !arg.is_empty() => {
                self.client.on_buffered(Path::new(arg)).await
            }
            "transition_to_static" if !arg.is_empty() => {
                self.client.on_static(Path::new(arg)).await
            }
            "abort" => {
                self.client.on_abort().await;
                Ok(())
            }
            _ => Err(anyhow!("unrecognised request '{request}'")),
        };

        match result {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                error!(request = verb, error = %format!("{e:#}"), "request failed");
                if matches!(verb, "transition_to_buffered" | "transition_to_static") {
                    self.client.on_abort().await;
                }
                format!("error: {e:#}").replace('\n', " ")
            }
        }
    }
}
