//! Transport abstractions for the bridge
//!
//! Provides AsyncReader/AsyncWriter traits over framed byte streams, and
//! implementations for anything that is `AsyncRead`/`AsyncWrite`.

use async_trait::async_trait;
use e2l_core::protocol::{FrameDecoder, frame_body};
use e2l_core::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Default socket read size
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Trait for async reading from a transport
#[async_trait]
pub trait AsyncReader: Send {
    /// Read the next complete message body
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. Cancelling
    /// the future between reads loses no data.
    async fn read_message(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Trait for async writing to a transport
#[async_trait]
pub trait AsyncWriter: Send {
    /// Write one message body behind its length field
    async fn write_message(&mut self, body: &[u8]) -> Result<()>;
}

/// Reads length-prefixed frames in fixed-size chunks
///
/// A frame larger than the chunk size spans several reads and is handed
/// out only once complete.
pub struct FramedReader<R> {
    inner: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FramedReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            chunk: vec![0u8; chunk_size.max(1)],
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AsyncReader for FramedReader<R> {
    async fn read_message(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(body) = self.decoder.next_frame()? {
                return Ok(Some(body));
            }
            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                if self.decoder.pending() > 0 {
                    debug!(pending = self.decoder.pending(), "stream closed inside a frame");
                }
                return Ok(None);
            }
            trace!(len = n, "read chunk");
            self.decoder.extend(&self.chunk[..n]);
        }
    }
}

/// Writes length-prefixed frames
pub struct FramedWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> FramedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AsyncWriter for FramedWriter<W> {
    async fn write_message(&mut self, body: &[u8]) -> Result<()> {
        let frame = frame_body(body)?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2l_core::protocol::{decode, encode, encode_frame};
    use e2l_core::{BridgeError, Value};
    use tokio_test::io::Builder;

    fn message(cmd: &str) -> Value {
        Value::map([("cmd", Value::from(cmd))])
    }

    #[tokio::test]
    async fn test_frame_split_across_three_reads() {
        let frame = encode_frame(&message("get_spec")).unwrap();
        let mock = Builder::new()
            .read(&frame[..5])
            .read(&frame[5..12])
            .read(&frame[12..])
            .build();

        let mut reader = FramedReader::new(mock);
        let body = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decode(&body).unwrap(), message("get_spec"));
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_message_larger_than_chunk() {
        let big = Value::Bytes(vec![42u8; 5000]);
        let frame = encode_frame(&big).unwrap();
        let mock = Builder::new().read(&frame).build();

        let mut reader = FramedReader::with_chunk_size(mock, 64);
        let body = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decode(&body).unwrap(), big);
    }

    #[tokio::test]
    async fn test_two_frames_in_one_read() {
        let mut bytes = encode_frame(&message("reset")).unwrap();
        bytes.extend(encode_frame(&message("step")).unwrap());
        let mock = Builder::new().read(&bytes).build();

        let mut reader = FramedReader::new(mock);
        let first = reader.read_message().await.unwrap().unwrap();
        let second = reader.read_message().await.unwrap().unwrap();
        assert_eq!(decode(&first).unwrap(), message("reset"));
        assert_eq!(decode(&second).unwrap(), message("step"));
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_length_field() {
        let mock = Builder::new().read(b"0000x012abcdefghijkl").build();
        let mut reader = FramedReader::new(mock);
        assert!(matches!(
            reader.read_message().await,
            Err(BridgeError::FrameLength(_))
        ));
    }

    #[tokio::test]
    async fn test_writer_prefixes_length() {
        let body = encode(&message("seed")).unwrap();
        let mut expected = format!("{:08}", body.len()).into_bytes();
        expected.extend_from_slice(&body);
        let mock = Builder::new().write(&expected).build();

        let mut writer = FramedWriter::new(mock);
        writer.write_message(&body).await.unwrap();
    }
}
