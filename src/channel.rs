//! One-directional, length-prefixed frame transport between two stages.
//!
//! The producer writes a big-endian `i32` count followed by that many
//! big-endian `f64` values; the consumer reads exactly that framing. Frames
//! are whole-or-nothing hand-offs of one complete vector; a short read or
//! short write is always a fatal transport error.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};

use crate::error::{PipelineErr, Result};

const COUNT_SIZE: usize = size_of::<i32>();
const VALUE_SIZE: usize = size_of::<f64>();

/// Wire size of one frame carrying `values` elements.
pub fn frame_size(values: usize) -> usize {
    COUNT_SIZE + values * VALUE_SIZE
}

/// Creates an in-process stage channel holding at most one frame of up to
/// `max_values` elements.
///
/// # Returns
/// The producer and consumer ends of the channel.
pub fn stage_channel(max_values: usize) -> (FrameSender<DuplexStream>, FrameReceiver<DuplexStream>) {
    let (tx, rx) = tokio::io::duplex(frame_size(max_values));
    (FrameSender::new(tx), FrameReceiver::new(rx))
}

fn transport(err: io::Error) -> PipelineErr {
    PipelineErr::ChannelProtocolViolation {
        detail: format!("frame transport failed: {err}"),
    }
}

/// The producing end of a stage channel.
pub struct FrameSender<W: AsyncWrite + Unpin> {
    tx: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
        }
    }

    /// Sends one complete frame.
    ///
    /// The full vector is composed before transmission; there are no partial
    /// or streamed frames.
    pub async fn send(&mut self, values: &[f64]) -> Result<()> {
        debug_assert!(values.len() <= i32::MAX as usize);
        let Self { tx, buf } = self;

        buf.clear();
        buf.reserve(frame_size(values.len()));
        buf.extend_from_slice(&(values.len() as i32).to_be_bytes());
        for value in values {
            buf.extend_from_slice(&value.to_be_bytes());
        }

        tx.write_all(buf).await.map_err(transport)?;
        tx.flush().await.map_err(transport)
    }
}

/// The consuming end of a stage channel.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Blocks until one complete frame is available and returns its values.
    pub async fn recv(&mut self) -> Result<Vec<f64>> {
        let count = self.read_count().await?;
        self.read_values(count).await
    }

    /// Like [`recv`](Self::recv), but a frame count other than `expected` is
    /// a protocol violation rather than a silent truncation or padding.
    pub async fn recv_expected(&mut self, expected: usize) -> Result<Vec<f64>> {
        let count = self.read_count().await?;
        if count != expected {
            return Err(PipelineErr::ChannelProtocolViolation {
                detail: format!("frame count mismatch: expected {expected}, got {count}"),
            });
        }
        self.read_values(count).await
    }

    async fn read_count(&mut self) -> Result<usize> {
        let mut header = [0u8; COUNT_SIZE];
        self.rx.read_exact(&mut header).await.map_err(transport)?;
        let count = i32::from_be_bytes(header);
        if count < 0 {
            return Err(PipelineErr::ChannelProtocolViolation {
                detail: format!("negative frame count: {count}"),
            });
        }
        Ok(count as usize)
    }

    async fn read_values(&mut self, count: usize) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(count);
        let mut scratch = [0u8; VALUE_SIZE];
        for _ in 0..count {
            self.rx.read_exact(&mut scratch).await.map_err(transport)?;
            values.push(f64::from_be_bytes(scratch));
        }
        Ok(values)
    }
}
