//! TCP transport implementation for the bridge

use crate::transport::{FramedReader, FramedWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// TCP read half speaking the framed protocol
pub type TcpReadWrapper = FramedReader<OwnedReadHalf>;

/// TCP write half speaking the framed protocol
pub type TcpWriteWrapper = FramedWriter<OwnedWriteHalf>;

/// Split a connected stream into framed halves
pub fn split(stream: TcpStream, chunk_size: usize) -> (TcpReadWrapper, TcpWriteWrapper) {
    let (read, write) = stream.into_split();
    (
        FramedReader::with_chunk_size(read, chunk_size),
        FramedWriter::new(write),
    )
}
