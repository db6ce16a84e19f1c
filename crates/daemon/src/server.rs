// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;
use std::time::Instant;

use nlog_core::SystemClock;
use nlog_daemon::protocol::{
    self, ProtocolError, Request, Response, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
    MAX_RECORDS_PER_RESPONSE, PROTOCOL_VERSION,
};
use nlog_engine::{NotificationListener, QueryFacade};
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::lifecycle::DaemonStorage;

/// Everything a connection handler needs; cheap to clone per connection
#[derive(Clone)]
pub struct ServerContext {
    pub ingest: NotificationListener<SystemClock>,
    pub query: QueryFacade<DaemonStorage>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Handle a single client connection
pub async fn handle_connection(ctx: ServerContext, stream: UnixStream) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    if let Request::Watch { limit } = request {
        return watch(&ctx, limit, reader, writer).await;
    }

    // Handle request
    let response = handle_request(&ctx, request).await;

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    respond(&mut writer, &response)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Write a response, answering with `Response::Error` when it cannot be framed
///
/// Returns false when the error went out instead of `response`.
async fn respond(writer: &mut OwnedWriteHalf, response: &Response) -> Result<bool, ProtocolError> {
    match protocol::write_response(writer, response, DEFAULT_TIMEOUT).await {
        Ok(()) => Ok(true),
        // Nothing was written; encoding fails before the frame starts
        Err(ProtocolError::MessageTooLarge(size)) => {
            warn!(size, "response exceeds message limit");
            let error = Response::Error {
                message: format!(
                    "response of {} bytes exceeds the {} byte message limit; request fewer records",
                    size, MAX_MESSAGE_SIZE
                ),
            };
            protocol::write_response(writer, &error, DEFAULT_TIMEOUT).await?;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Handle a single request and return a response
pub(crate) async fn handle_request(ctx: &ServerContext, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Posted { event } => Response::Accepted {
            submission: ctx.ingest.on_posted(event),
        },

        Request::Removed { event } => Response::Accepted {
            submission: ctx.ingest.on_removed(event),
        },

        Request::Connected => {
            ctx.ingest.on_connected();
            Response::Ok
        }

        Request::Disconnected => {
            ctx.ingest.on_disconnected();
            Response::Ok
        }

        Request::ListRecent { limit } => match ctx
            .query
            .list_recent(limit.min(MAX_RECORDS_PER_RESPONSE))
            .await
        {
            Ok(records) => Response::Records { records },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Purge { source } => match ctx.query.purge(&source).await {
            Ok(count) => Response::Purged { count },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Delete { id } => match ctx.query.pipeline().delete(id).await {
            Ok(removed) => Response::Deleted { removed },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Watch { .. } => Response::Error {
            message: "watch must be the only request on its connection".to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            connection: ctx.ingest.connection().snapshot(),
            records: ctx.query.len(),
            stats: ctx.ingest.pipeline().stats(),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

/// Stream snapshots until the client hangs up or the pipeline stops
async fn watch(
    ctx: &ServerContext,
    limit: usize,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let mut subscription = ctx
        .query
        .subscribe_recent(limit.min(MAX_RECORDS_PER_RESPONSE));
    let mut peek = [0u8; 1];

    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(records) = snapshot else {
                    debug!("Pipeline stopped, ending watch");
                    return Ok(());
                };
                let response = Response::Records { records };
                match respond(&mut writer, &response).await {
                    Ok(true) => {}
                    Ok(false) => return Ok(()),
                    Err(e) => {
                        debug!("Watch client gone: {}", e);
                        return Ok(());
                    }
                }
            }
            // Clients send nothing after Watch; any read result means hang-up
            _ = reader.read(&mut peek) => {
                debug!("Watch client disconnected");
                return Ok(());
            }
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
