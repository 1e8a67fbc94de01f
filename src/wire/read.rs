use tokio::io::{AsyncRead, AsyncReadExt};

use super::SvnItem;
use crate::SvnError;

const READ_CHUNK: usize = 16384;

/// An incremental parser for `ra_svn` items.
///
/// Reads from any async byte source and reassembles items regardless of how
/// the transport fragments them. The reader owns a single grow-on-demand
/// buffer; consumed bytes are compacted away before each refill.
pub struct ItemReader<R> {
    read: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: AsyncRead + Unpin> ItemReader<R> {
    pub fn new(read: R) -> Self {
        Self {
            read,
            buf: Vec::with_capacity(READ_CHUNK),
            pos: 0,
        }
    }

    /// Reads the next item, treating end of stream as an error.
    pub async fn read_item(&mut self) -> Result<SvnItem, SvnError> {
        match self.read_item_opt().await? {
            Some(item) => Ok(item),
            None => Err(SvnError::UnexpectedEof("item")),
        }
    }

    /// Reads the next item, or `Ok(None)` on a clean end of stream.
    ///
    /// End of stream is clean only at an item boundary; running dry inside a
    /// token, string body, or open list is an [`SvnError::UnexpectedEof`].
    pub async fn read_item_opt(&mut self) -> Result<Option<SvnItem>, SvnError> {
        if !self.skip_ws_to_token().await? {
            return Ok(None);
        }
        if self.buf[self.pos] == b'(' {
            self.read_list().await.map(Some)
        } else {
            self.read_atom().await.map(Some)
        }
    }

    /// Reads the next item and requires it to be the given word.
    pub async fn expect_word(&mut self, word: &str) -> Result<(), SvnError> {
        let item = self.read_item().await?;
        match item.as_word() {
            Some(w) if w == word => Ok(()),
            _ => Err(SvnError::Protocol(format!(
                "expected word '{word}', got {} '{item}'",
                item.kind()
            ))),
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.read
    }

    pub fn into_inner(self) -> R {
        self.read
    }

    /// Refills the buffer with one read. Returns the byte count, zero on EOF.
    async fn fill(&mut self) -> Result<usize, SvnError> {
        if self.pos > 0 {
            self.buf.copy_within(self.pos.., 0);
            self.buf.truncate(self.buf.len() - self.pos);
            self.pos = 0;
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.read.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Skips whitespace up to the next token byte.
    ///
    /// Returns `false` on a clean end of stream, `true` once `buf[pos]` is a
    /// non-whitespace byte.
    async fn skip_ws_to_token(&mut self) -> Result<bool, SvnError> {
        loop {
            while self.pos < self.buf.len() {
                if !self.buf[self.pos].is_ascii_whitespace() {
                    return Ok(true);
                }
                self.pos += 1;
            }
            if self.fill().await? == 0 {
                return Ok(false);
            }
        }
    }

    async fn peek_filled(&mut self) -> Result<Option<u8>, SvnError> {
        if self.pos == self.buf.len() && self.fill().await? == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[self.pos]))
    }

    /// Consumes the single whitespace byte that terminates every atom.
    async fn require_ws(&mut self) -> Result<(), SvnError> {
        match self.peek_filled().await? {
            Some(b) if b.is_ascii_whitespace() => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(SvnError::Protocol(format!(
                "expected whitespace after token, got 0x{b:02x}"
            ))),
            None => Err(SvnError::UnexpectedEof("token separator")),
        }
    }

    /// Parses a list without recursing, so hostile nesting depth cannot
    /// overflow the stack.
    async fn read_list(&mut self) -> Result<SvnItem, SvnError> {
        self.pos += 1; // the opening paren
        self.require_ws().await?;
        let mut stack: Vec<Vec<SvnItem>> = vec![Vec::new()];
        loop {
            if !self.skip_ws_to_token().await? {
                return Err(SvnError::UnexpectedEof("list"));
            }
            match self.buf[self.pos] {
                b'(' => {
                    self.pos += 1;
                    self.require_ws().await?;
                    stack.push(Vec::new());
                }
                b')' => {
                    self.pos += 1;
                    self.require_ws().await?;
                    let done = match stack.pop() {
                        Some(items) => items,
                        None => {
                            return Err(SvnError::Protocol("unbalanced list".to_string()));
                        }
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.push(SvnItem::List(done)),
                        None => return Ok(SvnItem::List(done)),
                    }
                }
                _ => {
                    let atom = self.read_atom().await?;
                    match stack.last_mut() {
                        Some(top) => top.push(atom),
                        None => {
                            return Err(SvnError::Protocol("unbalanced list".to_string()));
                        }
                    }
                }
            }
        }
    }

    /// Parses one non-list atom starting at `buf[pos]`.
    async fn read_atom(&mut self) -> Result<SvnItem, SvnError> {
        let first = self.buf[self.pos];
        if first.is_ascii_digit() {
            let n = self.parse_digits().await?;
            if self.peek_filled().await? == Some(b':') {
                self.pos += 1;
                let body = self.read_exact_vec(n).await?;
                self.require_ws().await?;
                Ok(SvnItem::String(body))
            } else {
                self.require_ws().await?;
                let n = i64::try_from(n)
                    .map_err(|_| SvnError::Protocol(format!("number {n} out of range")))?;
                Ok(SvnItem::Number(n))
            }
        } else if first == b'-' {
            self.pos += 1;
            match self.peek_filled().await? {
                Some(b) if b.is_ascii_digit() => {}
                _ => return Err(SvnError::Protocol("invalid token".to_string())),
            }
            let mag = self.parse_digits().await?;
            self.require_ws().await?;
            if mag == i64::MIN.unsigned_abs() {
                Ok(SvnItem::Number(i64::MIN))
            } else {
                let mag = i64::try_from(mag)
                    .map_err(|_| SvnError::Protocol(format!("number -{mag} out of range")))?;
                Ok(SvnItem::Number(-mag))
            }
        } else {
            self.parse_word().await
        }
    }

    /// Parses a run of decimal digits; the first byte must already be one.
    async fn parse_digits(&mut self) -> Result<u64, SvnError> {
        let mut n = 0u64;
        loop {
            match self.peek_filled().await? {
                Some(b) if b.is_ascii_digit() => {
                    self.pos += 1;
                    n = n
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(u64::from(b - b'0')))
                        .ok_or_else(|| SvnError::Protocol("number too large".to_string()))?;
                }
                _ => return Ok(n),
            }
        }
    }

    async fn read_exact_vec(&mut self, len: u64) -> Result<Vec<u8>, SvnError> {
        let len = usize::try_from(len)
            .map_err(|_| SvnError::Protocol(format!("string of {len} bytes too large")))?;
        let mut body = Vec::with_capacity(len.min(READ_CHUNK));
        while body.len() < len {
            if self.pos == self.buf.len() && self.fill().await? == 0 {
                return Err(SvnError::UnexpectedEof("string body"));
            }
            let take = (len - body.len()).min(self.buf.len() - self.pos);
            body.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
        }
        Ok(body)
    }

    async fn parse_word(&mut self) -> Result<SvnItem, SvnError> {
        let first = self.buf[self.pos];
        if !first.is_ascii_alphabetic() {
            return Err(SvnError::Protocol(format!(
                "invalid word token starting with 0x{first:02x}"
            )));
        }
        let mut word = String::new();
        word.push(first as char);
        self.pos += 1;
        loop {
            match self.peek_filled().await? {
                Some(b) if b.is_ascii_alphanumeric() || b == b'-' => {
                    self.pos += 1;
                    word.push(b as char);
                }
                _ => break,
            }
        }
        self.require_ws().await?;
        Ok(SvnItem::Word(word))
    }
}
