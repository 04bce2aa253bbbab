pub mod http;
pub mod noop;

use crate::domain::models::RetrieverBox;

pub struct RetrieverManager {}

impl RetrieverManager {
    /// An HTTP retriever when `url` is set, otherwise one that never finds
    /// anything.
    pub fn get(url: &str) -> RetrieverBox {
        if url.trim().is_empty() {
            return Box::<noop::Noop>::default();
        }

        return Box::new(http::HttpRetriever::new(url));
    }
}
