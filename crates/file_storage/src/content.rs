//! Upload content and its conversion into a single byte buffer.

use std::{fmt, io};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream::BoxStream};
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};

use crate::StorageResult;

/// Content accepted by [`StorageAdapter::upload`](crate::StorageAdapter::upload).
///
/// Adapters need the size (and sometimes a hash) before handing data to the
/// backend, so every shape is normalized into one [`Bytes`] buffer with
/// [`to_bytes`].
pub enum Content {
    /// Already materialized bytes.
    Bytes(Bytes),

    /// Push-style stream of chunks, concatenated in arrival order.
    Stream(BoxStream<'static, io::Result<Bytes>>),

    /// File-like source read through a buffered reader.
    Reader(Box<dyn AsyncBufRead + Send + Unpin>),
}

impl Content {
    /// Wrap a stream of chunks.
    ///
    /// Chunks only need to convert into [`Bytes`], so `Vec<u8>`, `String` and
    /// static slices are accepted as well.
    pub fn from_stream<S, T, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Into<Bytes> + 'static,
        E: Into<io::Error> + 'static,
    {
        let stream = stream.map(|chunk: Result<T, E>| -> io::Result<Bytes> {
            chunk.map(Into::into).map_err(Into::into)
        });
        Content::Stream(stream.boxed())
    }

    /// Wrap a buffered reader.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Content::Reader(Box::new(reader))
    }

    /// Wrap an open file.
    pub fn from_file(file: tokio::fs::File) -> Self {
        Content::from_reader(BufReader::new(file))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::Stream(_) => f.write_str("Stream"),
            Content::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Content::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Content {
    fn from(data: &'static [u8]) -> Self {
        Content::Bytes(Bytes::from_static(data))
    }
}

impl From<String> for Content {
    fn from(data: String) -> Self {
        Content::Bytes(Bytes::from(data))
    }
}

impl From<&'static str> for Content {
    fn from(data: &'static str) -> Self {
        Content::Bytes(Bytes::from_static(data.as_bytes()))
    }
}

/// Materialize content into a single buffer.
///
/// Bytes are returned as-is. Read and stream errors are propagated with the
/// original [`io::Error`] as source.
pub async fn to_bytes(content: Content) -> StorageResult<Bytes> {
    match content {
        Content::Bytes(bytes) => Ok(bytes),
        Content::Reader(mut reader) => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data).await?;
            Ok(Bytes::from(data))
        }
        Content::Stream(mut stream) => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            Ok(buffer.freeze())
        }
    }
}
