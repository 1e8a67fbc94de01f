use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors returned by this crate.
pub enum SvnError {
    /// An I/O error occurred while reading/writing the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes on the wire did not match the `ra_svn` item grammar.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A date string did not match the canonical Subversion form.
    #[error("invalid date: {0}")]
    InvalidDate(String),
    /// The stream ended inside a token, length prefix, or frame payload.
    ///
    /// A clean end of stream at a token or frame boundary is not an error; it
    /// is reported as `Ok(None)` (items) or a zero-byte read (frames).
    #[error("unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),
    /// The negotiated security layer rejected data.
    ///
    /// This is fatal for the connection: the stream cannot be trusted after a
    /// failed encode/decode and must be closed.
    #[error("security layer error: {0}")]
    Decode(String),
}

impl From<SvnError> for std::io::Error {
    fn from(err: SvnError) -> Self {
        use std::io::ErrorKind;
        match err {
            SvnError::Io(inner) => inner,
            SvnError::UnexpectedEof(what) => Self::new(
                ErrorKind::UnexpectedEof,
                format!("unexpected end of stream while reading {what}"),
            ),
            other => Self::new(ErrorKind::InvalidData, other.to_string()),
        }
    }
}
