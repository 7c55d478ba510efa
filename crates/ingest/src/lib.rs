mod append;
mod client;
mod domains;
mod encoding;
mod event;
mod flatten;
mod keys;
mod partition;
mod pipeline;
mod records;
mod storage;
mod timestamps;
mod utils;

pub use append::*;
pub use client::*;
pub use domains::*;
pub use encoding::*;
pub use event::*;
pub use flatten::*;
pub use keys::*;
pub use partition::*;
pub use pipeline::*;
pub use records::*;
pub use storage::*;
pub use timestamps::*;
pub use utils::*;
