//! Server-side codec for Subversion's `svn://` (`ra_svn`) protocol.
//!
//! This crate implements the wire plumbing an `svnserve`-style server needs:
//! the item data language, SASL security-layer framing, svndiff content
//! encoding, and the streaming `get-file-revs` response. It is a codec and
//! does **not** implement a repository backend or the command dispatch loop.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use svnwire::{FileRevHistory, FileRevision, FileRevsEmitter, ItemWriter};
//!
//! fn main() -> svnwire::Result<()> {
//!     let rt = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!
//!     rt.block_on(async {
//!         let mut rev = FileRevision::new(1, "/trunk/notes.txt");
//!         rev.author = Some("alice".to_string());
//!         rev.content = Some(b"first line\n".to_vec());
//!         let history: FileRevHistory = [rev].into_iter().collect();
//!
//!         // Any AsyncWrite works here; a real server hands over its
//!         // connection, framed or not.
//!         let mut writer = ItemWriter::new(Vec::new());
//!         FileRevsEmitter::new().emit(&history, &mut writer).await?;
//!         Ok(())
//!     })
//! }
//! ```
//!
//! ## Features
//!
//! - `serde`: enables `Serialize`/`Deserialize` for public data types.
//!
//! ## Protocol notes
//!
//! - When authentication negotiates a SASL security layer, wrap the
//!   connection in [`SaslFrameReader`]/[`SaslFrameWriter`]; the item codec
//!   stacks on top unchanged.
//! - Dates travel as fixed-width UTC strings with microsecond precision; see
//!   [`SvnDate`].
//!
//! ## Low-level access
//!
//! For raw wire protocol items, see [`raw::SvnItem`].

#![deny(unsafe_code)]

mod date;
mod error;
mod filerevs;
mod sasl;
mod svndiff;
mod types;
mod wire;

pub use date::SvnDate;
pub use error::SvnError;
/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, SvnError>;
pub use filerevs::FileRevsEmitter;
pub use sasl::{DEFAULT_FRAME_BUF_SIZE, SaslFrameReader, SaslFrameWriter, SecurityLayer};
pub use svndiff::SvndiffVersion;
/// Low-level wire-protocol types and helpers.
pub mod raw {
    pub use crate::wire::SvnItem;
}
pub use types::{FileRevHistory, FileRevision, PropDelta, PropertyList};
pub use wire::{ItemReader, ItemWriter, SvnItem};
