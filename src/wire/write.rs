use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{SvnItem, encode_item};
use crate::SvnError;

/// Serializes `ra_svn` items onto an async byte sink.
///
/// Each item is encoded into an internal scratch buffer and written with a
/// single `write_all`, followed by a newline. The newline is redundant for the
/// grammar but matches what `svnserve` emits and keeps captures readable.
pub struct ItemWriter<W> {
    write: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> ItemWriter<W> {
    pub fn new(write: W) -> Self {
        Self {
            write,
            buf: Vec::new(),
        }
    }

    /// Encodes and writes one item.
    pub async fn write_item(&mut self, item: &SvnItem) -> Result<(), SvnError> {
        self.buf.clear();
        encode_item(item, &mut self.buf);
        self.buf.push(b'\n');
        self.write.write_all(&self.buf).await?;
        Ok(())
    }

    /// Writes a bare word, outside any list.
    pub async fn write_word(&mut self, word: &str) -> Result<(), SvnError> {
        self.write_item(&SvnItem::Word(word.to_string())).await
    }

    pub async fn flush(&mut self) -> Result<(), SvnError> {
        self.write.flush().await?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.write
    }

    pub fn into_inner(self) -> W {
        self.write
    }
}
