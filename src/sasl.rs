//! SASL security-layer framing.
//!
//! After authentication negotiates a security layer, every byte on the
//! connection travels inside frames: a 4-byte big-endian ciphertext length
//! followed by the ciphertext itself. Plaintext is buffered and sealed into
//! frames on the write side, and reassembled from frames on the read side, so
//! the item codec above never sees the framing.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::trace;

use crate::SvnError;

/// Default plaintext buffer capacity for [`SaslFrameWriter`].
///
/// Matches the buffer size `svnserve` advertises during SASL negotiation.
pub const DEFAULT_FRAME_BUF_SIZE: usize = 4096 * 4;

/// A negotiated SASL security layer.
///
/// `encode` seals one plaintext buffer into ciphertext; `decode` reverses it.
/// Implementations may keep per-connection state (sequence numbers, cipher
/// state), hence `&mut self`. A failed call poisons the connection; callers
/// must not retry on the same stream.
pub trait SecurityLayer: Send {
    fn encode(&mut self, plain: &[u8]) -> Result<Vec<u8>, SvnError>;
    fn decode(&mut self, cipher: &[u8]) -> Result<Vec<u8>, SvnError>;
}

/// Wraps an async byte sink and seals written bytes into SASL frames.
///
/// Bytes accumulate in a fixed-capacity plaintext buffer. A full buffer is
/// sealed into one frame; `flush` seals whatever remains. Zero-length frames
/// are never produced. Each frame's four-byte prefix and ciphertext become a
/// single pending write, so a frame is never interleaved with another.
pub struct SaslFrameWriter<W> {
    write: W,
    layer: Box<dyn SecurityLayer>,
    buf: Vec<u8>,
    capacity: usize,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<W: AsyncWrite + Unpin> SaslFrameWriter<W> {
    pub fn new(write: W, layer: Box<dyn SecurityLayer>) -> Self {
        Self::with_capacity(write, layer, DEFAULT_FRAME_BUF_SIZE)
    }

    pub fn with_capacity(write: W, layer: Box<dyn SecurityLayer>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            write,
            layer,
            buf: Vec::with_capacity(capacity),
            capacity,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.write
    }

    /// Seals the buffered plaintext into one pending frame.
    fn seal_frame(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let cipher = self.layer.encode(&self.buf).map_err(io::Error::from)?;
        if cipher.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "security layer produced an empty frame",
            ));
        }
        let len = u32::try_from(cipher.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "frame exceeds u32 length")
        })?;
        trace!(plain = self.buf.len(), cipher = cipher.len(), "sealed frame");
        self.pending.clear();
        self.pending.extend_from_slice(&len.to_be_bytes());
        self.pending.extend_from_slice(&cipher);
        self.pending_pos = 0;
        self.buf.clear();
        Ok(())
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.pending_pos < self.pending.len() {
            let n = ready!(
                Pin::new(&mut self.write).poll_write(cx, &self.pending[self.pending_pos..])
            )?;
            if n == 0 {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "frame sink closed mid-frame",
                )));
            }
            self.pending_pos += n;
        }
        self.pending.clear();
        self.pending_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for SaslFrameWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let take = (this.capacity - this.buf.len()).min(data.len());
        this.buf.extend_from_slice(&data[..take]);
        if this.buf.len() == this.capacity {
            this.seal_frame()?;
            // The bytes are already accepted; draining now is best-effort
            // and Pending is not an error here.
            if let Poll::Ready(Err(err)) = this.poll_drain(cx) {
                return Poll::Ready(Err(err));
            }
        }
        Poll::Ready(Ok(take))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        this.seal_frame()?;
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.write).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.as_mut().poll_flush(cx))?;
        Pin::new(&mut self.get_mut().write).poll_shutdown(cx)
    }
}

enum ReadState {
    Prefix { filled: usize },
    Payload { len: usize, filled: usize },
}

/// Wraps an async byte source and unseals SASL frames back into plaintext.
///
/// Short reads are reassembled: the four-byte prefix and the frame payload
/// each fill incrementally across however many reads the transport needs. The
/// ciphertext scratch buffer is retained between frames and grown by half
/// again over the largest frame seen, so steady-state traffic allocates
/// nothing.
pub struct SaslFrameReader<R> {
    read: R,
    layer: Box<dyn SecurityLayer>,
    plain: Vec<u8>,
    pos: usize,
    prefix: [u8; 4],
    frame: Vec<u8>,
    state: ReadState,
}

impl<R: AsyncRead + Unpin> SaslFrameReader<R> {
    pub fn new(read: R, layer: Box<dyn SecurityLayer>) -> Self {
        Self {
            read,
            layer,
            plain: Vec::new(),
            pos: 0,
            prefix: [0; 4],
            frame: Vec::new(),
            state: ReadState::Prefix { filled: 0 },
        }
    }

    pub fn into_inner(self) -> R {
        self.read
    }

    /// Seeking is meaningless on a framed stream; always skips zero bytes.
    pub fn skip(&mut self, _n: u64) -> u64 {
        0
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for SaslFrameReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if out.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            if this.pos < this.plain.len() {
                let take = out.remaining().min(this.plain.len() - this.pos);
                out.put_slice(&this.plain[this.pos..this.pos + take]);
                this.pos += take;
                return Poll::Ready(Ok(()));
            }
            match this.state {
                ReadState::Prefix { filled } => {
                    let mut rb = ReadBuf::new(&mut this.prefix[filled..]);
                    ready!(Pin::new(&mut this.read).poll_read(cx, &mut rb))?;
                    let n = rb.filled().len();
                    if n == 0 {
                        if filled == 0 {
                            // End of stream at a frame boundary.
                            return Poll::Ready(Ok(()));
                        }
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "stream ended inside a frame length prefix",
                        )));
                    }
                    if filled + n < 4 {
                        this.state = ReadState::Prefix { filled: filled + n };
                        continue;
                    }
                    let len = u32::from_be_bytes(this.prefix) as usize;
                    if len == 0 {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "zero-length frame",
                        )));
                    }
                    if this.frame.len() < len {
                        this.frame.resize(len + len / 2, 0);
                    }
                    this.state = ReadState::Payload { len, filled: 0 };
                }
                ReadState::Payload { len, filled } => {
                    let mut rb = ReadBuf::new(&mut this.frame[filled..len]);
                    ready!(Pin::new(&mut this.read).poll_read(cx, &mut rb))?;
                    let n = rb.filled().len();
                    if n == 0 {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "stream ended inside a frame payload",
                        )));
                    }
                    if filled + n < len {
                        this.state = ReadState::Payload {
                            len,
                            filled: filled + n,
                        };
                        continue;
                    }
                    let plain = this
                        .layer
                        .decode(&this.frame[..len])
                        .map_err(io::Error::from)?;
                    trace!(cipher = len, plain = plain.len(), "unsealed frame");
                    this.plain = plain;
                    this.pos = 0;
                    this.state = ReadState::Prefix { filled: 0 };
                }
            }
        }
    }
}
