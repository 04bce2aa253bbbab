#[cfg(test)]
#[path = "model_preset_test.rs"]
mod tests;

/// Named model with the sampling defaults it ships with.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelPreset {
    pub name: &'static str,
    pub model_id: &'static str,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
}

pub const MODEL_PRESETS: [ModelPreset; 3] = [
    ModelPreset {
        name: "Claude 4 Sonnet",
        model_id: "claude-sonnet-4-20250514",
        temperature: 1.0,
        top_p: 1.0,
        top_k: 500,
        max_tokens: 32000,
    },
    ModelPreset {
        name: "Claude 3.7 Sonnet",
        model_id: "claude-3-7-sonnet-20250219",
        temperature: 1.0,
        top_p: 1.0,
        top_k: 500,
        max_tokens: 64000,
    },
    ModelPreset {
        name: "Claude 3.5 Sonnet",
        model_id: "claude-3-5-sonnet-20241022",
        temperature: 1.0,
        top_p: 1.0,
        top_k: 500,
        max_tokens: 4096,
    },
];

impl ModelPreset {
    pub fn default_preset() -> &'static ModelPreset {
        return &MODEL_PRESETS[0];
    }

    /// Finds a preset by display name or model id.
    pub fn find(name: &str) -> Option<&'static ModelPreset> {
        return MODEL_PRESETS.iter().find(|preset| {
            return preset.name.eq_ignore_ascii_case(name) || preset.model_id == name;
        });
    }

    /// Model id to send to a backend. Names that match no preset are assumed
    /// to already be a backend model id.
    pub fn resolve_model_id(name: &str) -> String {
        if name.is_empty() {
            return ModelPreset::default_preset().model_id.to_string();
        }

        return match ModelPreset::find(name) {
            Some(preset) => preset.model_id.to_string(),
            None => name.to_string(),
        };
    }
}
