use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

use crate::aof::{Aof, AofError};
use crate::codec::{CodecError, FrameCodec};
use crate::config::Config;
use crate::connection::Connection;
use crate::dispatcher::{is_write_command, Dispatcher, Request};
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Runs the server until the process receives Ctrl-C.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(config.listen_addr()).await?;

    serve(listener, config, async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for the shutdown signal");
        }
    })
    .await
}

/// Serves clients accepted on `listener` until `shutdown` completes.
///
/// The append-only file is opened and fully replayed before the first connection is accepted.
/// On shutdown the listener stops accepting and the file is synced and closed.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let aof = Arc::new(Aof::open(&config.aof_path, config.flush_interval()).await?);
    let dispatcher = Dispatcher::new(Store::new());

    let replayed = replay_log(&aof, &dispatcher).await?;
    info!(
        path = %aof.path().display(),
        frames = replayed,
        keys = dispatcher.store().len(),
        "restored state from append-only file"
    );

    info!("Server listening on {}", listener.local_addr()?);

    tokio::pin!(shutdown);

    loop {
        let (socket, client_address) = tokio::select! {
            res = listener.accept() => match res {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        info!("Accepted connection from {:?}", client_address);

        let dispatcher = dispatcher.clone();
        let aof = aof.clone();
        let codec = FrameCodec::with_max_frame_size(config.max_frame_size);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, codec, dispatcher, aof).await
            {
                error!(error = %e, "connection terminated");
            }
        });
    }

    info!("Shutting down");
    aof.close().await?;

    Ok(())
}

/// Rebuilds the store by running every logged request through `dispatcher`. The requests are
/// not logged again.
pub async fn replay_log(aof: &Aof, dispatcher: &Dispatcher) -> Result<usize, AofError> {
    aof.replay(|frame| {
        let request = match Request::try_from(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "skipping invalid request in append-only file");
                return;
            }
        };

        if let Err(e) = dispatcher.handle_request(request) {
            warn!(error = %e, "skipping request in append-only file");
        }
    })
    .await
}

#[instrument(
    name = "connection",
    skip(stream, codec, dispatcher, aof),
    fields(connection_id, client_address = %client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    codec: FrameCodec,
    dispatcher: Dispatcher,
    aof: Arc<Aof>,
) -> Result<(), CodecError> {
    let mut conn = Connection::with_codec(stream, codec);

    tracing::Span::current().record("connection_id", tracing::field::display(conn.id));

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);
        let res = respond(frame, &dispatcher, &aof).await;
        debug!("Sending response to client: {}", res);

        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}

/// Executes one request and builds its reply. Successful writes are appended to the log before
/// the reply is returned.
async fn respond(frame: Frame, dispatcher: &Dispatcher, aof: &Aof) -> Frame {
    let request = match Request::try_from(frame.clone()) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "invalid request");
            return Frame::Error(format!("ERR {}", e));
        }
    };

    let is_write = is_write_command(&request.name);

    let res = match dispatcher.handle_request(request) {
        Ok(res) => res,
        Err(e) => {
            warn!(error = %e, "failed to dispatch request");
            return Frame::Error(format!("ERR {}", e));
        }
    };

    // The store is already updated at this point; a failed append leaves it ahead of the log.
    if is_write && !matches!(res, Frame::Error(_)) {
        if let Err(e) = aof.write(&frame).await {
            error!(error = %e, "failed to append write to the append-only file");
            return Frame::Error("ERR failed to persist write".to_string());
        }
    }

    res
}
