//! TCP server lifecycle and per-connection loop
//!
//! One task accepts connections and one task per connection reads, dispatches
//! and answers. The dispatcher sits behind a single mutex that is held for
//! the whole of each command, so commands from different connections never
//! interleave.

use crate::tcp;
use crate::transport::{AsyncReader, AsyncWriter};
use e2l_core::protocol::{decode, encode};
use e2l_core::{Response, Result, Value};
use e2l_server::{CommandDispatcher, Engine};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Dispatcher shared by every connection
pub type SharedDispatcher<E> = Arc<Mutex<CommandDispatcher<E>>>;

/// A bound, not yet running, bridge server
pub struct BridgeServer<E: Engine> {
    listener: TcpListener,
    dispatcher: SharedDispatcher<E>,
    chunk_size: usize,
}

impl<E: Engine> BridgeServer<E> {
    /// Bind to the address and port in the dispatcher's settings
    pub async fn bind(dispatcher: CommandDispatcher<E>) -> Result<Self> {
        let address = dispatcher.settings().bind_address();
        let chunk_size = dispatcher.settings().read_chunk_size;
        let listener = TcpListener::bind(&address).await?;
        info!(address = %listener.local_addr()?, "tcp server bound");
        Ok(Self {
            listener,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            chunk_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn dispatcher(&self) -> SharedDispatcher<E> {
        Arc::clone(&self.dispatcher)
    }

    /// Start accepting connections in the background
    ///
    /// The server runs until [`ServerHandle::stop`] is called or the handle
    /// is dropped.
    pub fn start(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let local_addr = self.listener.local_addr().ok();
        let task = tokio::spawn(self.accept_loop(shutdown_rx));
        ServerHandle {
            shutdown: shutdown_tx,
            task,
            local_addr,
        }
    }

    async fn accept_loop(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
                        }
                        let (reader, writer) = tcp::split(stream, self.chunk_size);
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            info!(peer = %peer, "new client connection");
                            match serve_connection(reader, writer, dispatcher, shutdown).await {
                                Ok(()) => info!(peer = %peer, "client disconnected"),
                                Err(e) => error!(peer = %peer, error = %e, "connection closed"),
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }
        info!("tcp server ended");
    }
}

/// Handle to a running server
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting, close idle connections and wait for the accept loop
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "accept loop panicked");
        }
    }
}

/// Serve one connection until end-of-stream, shutdown, or a transport error
///
/// A frame whose body is not valid MessagePack is answered with an error
/// response and the connection stays open. A broken length field or a
/// socket error ends the connection.
pub async fn serve_connection<E, R, W>(
    mut reader: R,
    mut writer: W,
    dispatcher: SharedDispatcher<E>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    E: Engine,
    R: AsyncReader,
    W: AsyncWriter,
{
    loop {
        let body = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            read = reader.read_message() => match read? {
                Some(body) => body,
                None => return Ok(()),
            },
        };

        let (cmd, response) = match decode(&body) {
            Ok(message) => {
                let cmd = message
                    .get("cmd")
                    .and_then(Value::as_str)
                    .unwrap_or("<none>")
                    .to_string();
                let mut guard = dispatcher.lock().await;
                let response = guard.handle_message(&message);
                if guard.has_pending_pause() {
                    schedule_pause(Arc::clone(&dispatcher));
                }
                (cmd, response)
            }
            Err(e) => {
                warn!(len = body.len(), error = %e, "undecodable message");
                ("<undecodable>".to_string(), Response::error(e.to_string()))
            }
        };

        let encoded = encode(&response.to_value())?;
        debug!(cmd = %cmd, len = encoded.len(), "sending response");
        writer.write_message(&encoded).await?;
    }
}

/// Pause the world once the current command has released the dispatcher
fn schedule_pause<E: Engine>(dispatcher: SharedDispatcher<E>) {
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        dispatcher.lock().await.apply_pending_pause();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::{TcpReadWrapper, TcpWriteWrapper};
    use crate::transport::{FramedReader, FramedWriter};
    use e2l_core::protocol::{encode_frame, frame_body};
    use e2l_server::{BridgeSettings, InputSystem, SandboxEngine, WorldProvider};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn dispatcher() -> CommandDispatcher<SandboxEngine> {
        let (engine, _) = SandboxEngine::with_playing_world();
        let settings = BridgeSettings {
            port: 0,
            ..Default::default()
        };
        CommandDispatcher::new(engine, settings)
    }

    async fn connect(handle: &ServerHandle) -> (TcpReadWrapper, TcpWriteWrapper) {
        let stream = TcpStream::connect(handle.local_addr().unwrap()).await.unwrap();
        let (read, write) = stream.into_split();
        (FramedReader::new(read), FramedWriter::new(write))
    }

    async fn request(reader: &mut impl AsyncReader, writer: &mut impl AsyncWriter, message: Value) -> Value {
        writer.write_message(&encode(&message).unwrap()).await.unwrap();
        let body = reader.read_message().await.unwrap().unwrap();
        decode(&body).unwrap()
    }

    #[tokio::test]
    async fn test_undecodable_body_keeps_connection() {
        let handle = BridgeServer::bind(dispatcher()).await.unwrap().start();
        let (mut reader, mut writer) = connect(&handle).await;

        writer.write_message(&[0xc1]).await.unwrap();
        let body = reader.read_message().await.unwrap().unwrap();
        let response = Response::from_value(&decode(&body).unwrap()).unwrap();
        assert!(!response.is_ok());

        let seeded = request(
            &mut reader,
            &mut writer,
            Value::map([("cmd", Value::from("seed")), ("value", Value::Int(5))]),
        )
        .await;
        assert_eq!(seeded.get("new_seed"), Some(&Value::Int(5)));
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_bad_length_closes_connection() {
        let handle = BridgeServer::bind(dispatcher()).await.unwrap().start();
        let stream = TcpStream::connect(handle.local_addr().unwrap()).await.unwrap();
        let (read, mut write) = stream.into_split();

        write.write_all(b"nonsense").await.unwrap();
        let mut reader = FramedReader::new(read);
        assert!(reader.read_message().await.unwrap().is_none());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_pipelined_requests_answered_in_order() {
        let handle = BridgeServer::bind(dispatcher()).await.unwrap().start();
        let stream = TcpStream::connect(handle.local_addr().unwrap()).await.unwrap();
        let (read, mut write) = stream.into_split();

        let mut bytes = Vec::new();
        for seed in [1, 2, 3] {
            let message = Value::map([("cmd", Value::from("seed")), ("value", Value::Int(seed))]);
            bytes.extend(encode_frame(&message).unwrap());
        }
        write.write_all(&bytes).await.unwrap();

        let mut reader = FramedReader::new(read);
        for seed in [1, 2, 3] {
            let body = reader.read_message().await.unwrap().unwrap();
            assert_eq!(decode(&body).unwrap().get("new_seed"), Some(&Value::Int(seed)));
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_reset_pauses_world_afterwards() {
        let server = BridgeServer::bind(dispatcher()).await.unwrap();
        let shared = server.dispatcher();
        let handle = server.start();
        let (mut reader, mut writer) = connect(&handle).await;

        let response = request(&mut reader, &mut writer, Value::map([("cmd", Value::from("reset"))])).await;
        assert_eq!(response.get("status").and_then(Value::as_str), Some("ok"));

        // the deferred pause runs as soon as the dispatcher is free
        for _ in 0..50 {
            let guard = shared.lock().await;
            let world = guard.engine().playing_world().unwrap();
            if guard.engine().is_paused(world) {
                break;
            }
            drop(guard);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let guard = shared.lock().await;
        let world = guard.engine().playing_world().unwrap();
        assert!(guard.engine().is_paused(world));
        assert!(!guard.has_pending_pause());
        drop(guard);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_accept_loop() {
        let handle = BridgeServer::bind(dispatcher()).await.unwrap().start();
        let addr = handle.local_addr().unwrap();
        handle.stop().await;
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_frame_split_over_socket() {
        let handle = BridgeServer::bind(dispatcher()).await.unwrap().start();
        let stream = TcpStream::connect(handle.local_addr().unwrap()).await.unwrap();
        let (read, mut write) = stream.into_split();

        let body = encode(&Value::map([("cmd", Value::from("get_spec"))])).unwrap();
        let frame = frame_body(&body).unwrap();
        write.write_all(&frame[..4]).await.unwrap();
        write.flush().await.unwrap();
        tokio::task::yield_now().await;
        write.write_all(&frame[4..]).await.unwrap();

        let mut reader = FramedReader::new(read);
        let body = reader.read_message().await.unwrap().unwrap();
        let response = Response::from_value(&decode(&body).unwrap()).unwrap();
        assert!(matches!(response, Response::Spec { .. }));
        handle.stop().await;
    }
}
