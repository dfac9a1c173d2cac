use super::coerce::{is_truthy, to_js_string, to_number, JsNumber};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use utoipa::ToSchema;

pub const DEFAULT_MODEL: &str = "stable-diffusion-xl-1024-v1-0";

const DEFAULT_CFG_SCALE: f64 = 7.0;
const DEFAULT_HEIGHT: f64 = 1024.0;
const DEFAULT_WIDTH: f64 = 1024.0;
const DEFAULT_SAMPLES: f64 = 1.0;
const DEFAULT_STEPS: f64 = 30.0;

/// Upstream model variant the request is routed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetModel(String);

impl TargetModel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TargetModel {
    fn default() -> Self {
        Self(DEFAULT_MODEL.to_string())
    }
}

impl fmt::Display for TargetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text-to-image body sent upstream.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct NormalizedPayload {
    /// Passed through as given, `[]` when absent.
    #[schema(value_type = Vec<Object>)]
    pub text_prompts: Value,
    #[schema(value_type = f64, default = 7)]
    pub cfg_scale: JsNumber,
    #[schema(value_type = f64, default = 1024)]
    pub height: JsNumber,
    #[schema(value_type = f64, default = 1024)]
    pub width: JsNumber,
    #[schema(value_type = f64, default = 1)]
    pub samples: JsNumber,
    #[schema(value_type = f64, default = 30)]
    pub steps: JsNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)]
    pub seed: Option<JsNumber>,
}

/// Turn an untrusted request body into the upstream payload and target model.
///
/// Never fails: missing or unusable fields fall back to defaults. Numeric
/// fields use falsy-or-default semantics, so `0` is replaced by the default,
/// except for `seed` where `0` is a real value.
pub fn normalize(inbound: &Value) -> (NormalizedPayload, TargetModel) {
    let empty = Map::new();
    let mut fields = inbound.as_object().unwrap_or(&empty).clone();

    let target_model = fields
        .remove("modelId")
        .filter(is_truthy)
        .map(|model_id| to_js_string(&model_id).trim().to_string())
        .filter(|model_id| !model_id.is_empty())
        .map(TargetModel)
        .unwrap_or_default();

    let field = |key: &str| fields.get(key).filter(|v| is_truthy(v));
    let number_or = |key: &str, default: f64| match field(key) {
        Some(value) => to_number(value),
        None => JsNumber(default),
    };

    let mut payload = NormalizedPayload {
        text_prompts: field("text_prompts").cloned().unwrap_or_else(|| json!([])),
        cfg_scale: number_or("cfg_scale", DEFAULT_CFG_SCALE),
        height: number_or("height", DEFAULT_HEIGHT),
        width: number_or("width", DEFAULT_WIDTH),
        samples: number_or("samples", DEFAULT_SAMPLES),
        steps: number_or("steps", DEFAULT_STEPS),
        style_preset: None,
        seed: None,
    };

    // style_preset is assigned on its own, never through the generic field copy
    if let Some(style_preset) = field("style_preset") {
        payload.style_preset = Some(to_js_string(style_preset).trim().to_string());
    }

    payload.seed = fields
        .get("seed")
        .filter(|seed| !seed.is_null())
        .map(to_number);

    (payload, target_model)
}
