pub mod backends;
pub mod retrievers;
