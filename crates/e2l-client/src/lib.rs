//! Engine2Learn client for connecting to bridge servers
//!
//! This crate provides a typed async client that speaks the framed
//! MessagePack protocol over TCP.

use e2l_core::protocol::{FrameDecoder, decode, encode_frame};
use e2l_core::{
    ActionSpaceDesc, BridgeError, Command, ObservationSpaceDesc, Response, Result, Setter,
    StepRequest, Value,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

const READ_CHUNK_SIZE: usize = 8192;

/// Action and observation space of a running game
#[derive(Debug, Clone, PartialEq)]
pub struct GameSpec {
    pub action_space: ActionSpaceDesc,
    pub observation_space: ObservationSpaceDesc,
}

/// Client for one bridge connection
pub struct BridgeClient {
    stream: TcpStream,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl BridgeClient {
    /// Connect to a bridge server
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(peer = %stream.peer_addr()?, "connected to bridge");
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE],
        })
    }

    /// Advance the game and return the observation map
    pub async fn step(&mut self, request: StepRequest) -> Result<Value> {
        let response = self.request(&Command::Step(request)).await?;
        expect_observation(response)
    }

    /// Restart the level and return the observation map
    pub async fn reset(&mut self) -> Result<Value> {
        let response = self.request(&Command::Reset).await?;
        expect_observation(response)
    }

    /// Set the game's random seed; returns the seed applied
    pub async fn seed(&mut self, value: i64) -> Result<i64> {
        match self.request(&Command::Seed(value)).await? {
            Response::Seeded { new_seed } => Ok(new_seed),
            other => Err(unexpected("seed", &other)),
        }
    }

    /// Apply property setters and return the observation map
    pub async fn set(&mut self, setters: Vec<Setter>) -> Result<Value> {
        let response = self.request(&Command::Set(setters)).await?;
        expect_observation(response)
    }

    /// Fetch the action and observation space descriptors
    pub async fn get_spec(&mut self) -> Result<GameSpec> {
        match self.request(&Command::GetSpec).await? {
            Response::Spec {
                action_space,
                observation_space,
            } => Ok(GameSpec {
                action_space,
                observation_space,
            }),
            other => Err(unexpected("get_spec", &other)),
        }
    }

    /// Send a command; error responses become [`BridgeError::Server`]
    pub async fn request(&mut self, command: &Command) -> Result<Response> {
        let reply = self.send_raw(&command.to_value()).await?;
        match Response::from_value(&reply)? {
            Response::Error { message } => Err(BridgeError::Server(message)),
            response => Ok(response),
        }
    }

    /// Send any message and return the decoded reply
    pub async fn send_raw(&mut self, message: &Value) -> Result<Value> {
        let frame = encode_frame(message)?;
        debug!(len = frame.len(), "sending request");
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;

        let body = self.read_body().await?;
        debug!(len = body.len(), "received response");
        decode(&body)
    }

    async fn read_body(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(body) = self.decoder.next_frame()? {
                return Ok(body);
            }
            let n = self.stream.read(&mut self.chunk).await?;
            if n == 0 {
                return Err(BridgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
            self.decoder.extend(&self.chunk[..n]);
        }
    }

    /// Close the connection
    pub async fn shutdown(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn expect_observation(response: Response) -> Result<Value> {
    match response {
        Response::Observation(obs) => Ok(obs),
        other => Err(unexpected("observation", &other)),
    }
}

fn unexpected(expected: &str, response: &Response) -> BridgeError {
    BridgeError::malformed(format!("expected {} response, got {:?}", expected, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// One-shot server answering the first request with `reply`
    async fn serve_once(reply: Value) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 64];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                decoder.extend(&buf[..n]);
                if decoder.next_frame().unwrap().is_some() {
                    break;
                }
            }
            // answer in two writes to exercise reassembly
            let frame = encode_frame(&reply).unwrap();
            stream.write_all(&frame[..6]).await.unwrap();
            stream.flush().await.unwrap();
            stream.write_all(&frame[6..]).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_seed_roundtrip() {
        let addr = serve_once(Response::Seeded { new_seed: 9 }.to_value()).await;
        let mut client = BridgeClient::connect(addr).await.unwrap();
        assert_eq!(client.seed(9).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_error_response_becomes_server_error() {
        let addr = serve_once(Response::error("No playing world!").to_value()).await;
        let mut client = BridgeClient::connect(addr).await.unwrap();
        let err = client.reset().await.unwrap_err();
        assert!(matches!(err, BridgeError::Server(ref m) if m == "No playing world!"));
    }

    #[tokio::test]
    async fn test_wrong_response_kind() {
        let addr = serve_once(Response::Seeded { new_seed: 1 }.to_value()).await;
        let mut client = BridgeClient::connect(addr).await.unwrap();
        assert!(client.step(StepRequest::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });
        let mut client = BridgeClient::connect(addr).await.unwrap();
        let err = client.get_spec().await.unwrap_err();
        assert!(err.is_transport());
    }
}
