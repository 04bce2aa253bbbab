pub mod anthropic;
pub mod openai;

use anyhow::Result;

use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: BackendName) -> Result<BackendBox> {
        return match name {
            BackendName::Anthropic => Ok(Box::<anthropic::Anthropic>::default()),
            BackendName::OpenAI => Ok(Box::<openai::OpenAI>::default()),
        };
    }
}
