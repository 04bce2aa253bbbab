mod backend;
mod event;
mod model_preset;
mod retriever;
mod role;
mod session;
mod slash_commands;
mod turn;

pub use backend::*;
pub use event::*;
pub use model_preset::*;
pub use retriever::*;
pub use role::*;
pub use session::*;
pub use slash_commands::*;
pub use turn::*;
