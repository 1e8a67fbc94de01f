//! The `get-file-revs` response stream.
//!
//! For each revision in a file's history the server sends a metadata entry,
//! then the file content as svndiff chunks, then an empty string closing the
//! record. Content is delta-encoded against the previous revision whose
//! content was actually sent, so metadata-only revisions do not advance the
//! delta baseline. After the last record a bare `done` word closes the
//! response.

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::svndiff::{SvndiffVersion, encode_delta_with_options, encode_fulltext_with_options};
use crate::types::{FileRevHistory, FileRevision, PropDelta};
use crate::wire::{ItemWriter, SvnItem};
use crate::SvnError;

const DEFAULT_ZLIB_LEVEL: u32 = 5;
const DEFAULT_WINDOW_SIZE: usize = 16 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Streams a file's revision history as a `get-file-revs` response.
#[derive(Clone, Debug)]
pub struct FileRevsEmitter {
    version: SvndiffVersion,
    zlib_level: u32,
    window_size: usize,
    chunk_size: usize,
}

impl Default for FileRevsEmitter {
    fn default() -> Self {
        Self {
            version: SvndiffVersion::V1,
            zlib_level: DEFAULT_ZLIB_LEVEL,
            window_size: DEFAULT_WINDOW_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileRevsEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the svndiff container version negotiated with the client.
    pub fn with_version(mut self, version: SvndiffVersion) -> Self {
        self.version = version;
        self
    }

    /// Sets the zlib level for svndiff1 sections; 0 disables compression.
    pub fn with_zlib_level(mut self, level: u32) -> Self {
        self.zlib_level = level;
        self
    }

    /// Writes every record of `history` followed by the closing `done` word
    /// and flushes the writer.
    pub async fn emit<W: AsyncWrite + Unpin>(
        &self,
        history: &FileRevHistory,
        out: &mut ItemWriter<W>,
    ) -> Result<(), SvnError> {
        let mut baseline: Option<&[u8]> = None;
        for record in history.iter() {
            out.write_item(&entry_item(record)?).await?;
            if let Some(content) = record.content.as_deref() {
                let diff = match baseline {
                    None => encode_fulltext_with_options(
                        self.version,
                        content,
                        self.zlib_level,
                        self.window_size,
                    )?,
                    Some(base) => encode_delta_with_options(
                        self.version,
                        base,
                        content,
                        self.zlib_level,
                        self.window_size,
                    )?,
                };
                for chunk in diff.chunks(self.chunk_size) {
                    out.write_item(&SvnItem::String(chunk.to_vec())).await?;
                }
                baseline = Some(content);
                debug!(
                    path = %record.path,
                    rev = record.rev,
                    bytes = diff.len(),
                    "sent content delta"
                );
            }
            // Closes the record's chunk sequence, even when no content went out.
            out.write_item(&SvnItem::String(Vec::new())).await?;
        }
        out.write_word("done").await?;
        out.flush().await?;
        Ok(())
    }
}

/// Builds the metadata entry for one record:
/// `( path rev rev-props prop-deltas merged )`.
fn entry_item(record: &FileRevision) -> Result<SvnItem, SvnError> {
    let rev = i64::try_from(record.rev)
        .map_err(|_| SvnError::Protocol(format!("revision {} out of range", record.rev)))?;

    let mut rev_props = record.rev_props.clone();
    if let Some(author) = &record.author {
        rev_props.insert("svn:author".to_string(), author.clone().into_bytes());
    }
    if let Some(date) = &record.date {
        rev_props.insert("svn:date".to_string(), date.format().into_bytes());
    }
    if let Some(log) = &record.log {
        rev_props.insert("svn:log".to_string(), log.clone().into_bytes());
    }

    let rev_props = rev_props
        .into_iter()
        .map(|(name, value)| {
            SvnItem::List(vec![
                SvnItem::String(name.into_bytes()),
                SvnItem::String(value),
            ])
        })
        .collect();

    let prop_deltas = record.prop_deltas.iter().map(prop_delta_item).collect();

    Ok(SvnItem::List(vec![
        SvnItem::String(record.path.clone().into_bytes()),
        SvnItem::Number(rev),
        SvnItem::List(rev_props),
        SvnItem::List(prop_deltas),
        SvnItem::Word(if record.merged_revision { "true" } else { "false" }.to_string()),
    ]))
}

/// A property change entry: `( name value )` to set, `( name )` to delete.
fn prop_delta_item(delta: &PropDelta) -> SvnItem {
    let mut items = vec![SvnItem::String(delta.name.clone().into_bytes())];
    if let Some(value) = &delta.value {
        items.push(SvnItem::String(value.clone()));
    }
    SvnItem::List(items)
}
