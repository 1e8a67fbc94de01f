pub(crate) mod encode;
mod item;
mod read;
mod write;

pub use item::SvnItem;
pub use read::ItemReader;
pub use write::ItemWriter;

pub(crate) use item::encode_item;
