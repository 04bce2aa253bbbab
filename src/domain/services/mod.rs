mod assembler;
mod context;
mod conversation;
mod sessions;

pub use assembler::*;
pub use context::*;
pub use conversation::*;
pub use sessions::*;
