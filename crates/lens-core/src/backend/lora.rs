//! Merging PEFT LoRA adapters into base weights
//!
//! PEFT stores each adapted linear layer as a pair of low-rank factors
//! `lora_A` `[r, in]` and `lora_B` `[out, r]` under the prefix
//! `base_model.model.`. Merging folds `scale * B @ A` into the base weight so
//! the model runs without any adapter-specific code. Layers listed in
//! `modules_to_save` ship as full copies and replace the base weight.

use crate::{CoreError, Result};
use candle_core::{DType, Tensor};
use serde::Deserialize;
use std::collections::HashMap;

const PEFT_PREFIX: &str = "base_model.model.";

/// The subset of `adapter_config.json` needed to merge
#[derive(Debug, Clone, Deserialize)]
pub struct LoraConfig {
    pub r: usize,
    pub lora_alpha: f64,
    #[serde(default)]
    pub use_rslora: bool,
}

impl LoraConfig {
    pub fn scale(&self) -> f64 {
        if self.use_rslora {
            self.lora_alpha / (self.r as f64).sqrt()
        } else {
            self.lora_alpha / self.r as f64
        }
    }
}

/// What an adapter tensor does to the base weight it names
#[derive(Debug, PartialEq, Eq)]
enum AdapterTensor {
    LoraA(String),
    LoraB(String),
    /// Full trained copy from `modules_to_save`
    Replacement(String),
}

/// Classify an adapter tensor by name. `None` means the name is not one of
/// the PEFT layouts this merge understands.
fn classify(adapter_key: &str) -> Option<AdapterTensor> {
    let key = adapter_key.strip_prefix(PEFT_PREFIX).unwrap_or(adapter_key);
    // Older PEFT versions keep the adapter name, e.g. `lora_A.default.weight`
    let key = key.replace(".default.weight", ".weight");

    if let Some(stem) = key.strip_suffix(".lora_A.weight") {
        Some(AdapterTensor::LoraA(format!("{stem}.weight")))
    } else if let Some(stem) = key.strip_suffix(".lora_B.weight") {
        Some(AdapterTensor::LoraB(format!("{stem}.weight")))
    } else {
        key.strip_suffix(".modules_to_save.weight")
            .map(|stem| AdapterTensor::Replacement(format!("{stem}.weight")))
    }
}

fn mismatch(message: String, suggestion: &str) -> CoreError {
    CoreError::model("MODEL_ADAPTER_MISMATCH", message, suggestion)
}

/// Apply every tensor in `adapter` to `weights`.
///
/// Returns the number of updated base weights. An unrecognised adapter
/// tensor, a factor without its partner, or a target missing from the base
/// model is an error: a partially applied adapter would silently produce a
/// different model.
pub fn merge_lora(
    weights: &mut HashMap<String, Tensor>,
    adapter: &HashMap<String, Tensor>,
    config: &LoraConfig,
) -> Result<usize> {
    if config.r == 0 {
        return Err(CoreError::model(
            "MODEL_ADAPTER_INVALID",
            "adapter rank r must be positive",
            "Check adapter_config.json",
        ));
    }

    let mut pairs: HashMap<String, (Option<&Tensor>, Option<&Tensor>)> = HashMap::new();
    let mut replacements: Vec<(String, &Tensor)> = Vec::new();
    for (name, tensor) in adapter {
        match classify(name) {
            Some(AdapterTensor::LoraA(target)) => pairs.entry(target).or_default().0 = Some(tensor),
            Some(AdapterTensor::LoraB(target)) => pairs.entry(target).or_default().1 = Some(tensor),
            Some(AdapterTensor::Replacement(target)) => replacements.push((target, tensor)),
            None => {
                return Err(mismatch(
                    format!("adapter tensor {name} is neither a LoRA factor nor a saved module"),
                    "Re-export the adapter with PEFT",
                ))
            }
        }
    }

    if pairs.is_empty() && replacements.is_empty() {
        return Err(CoreError::model(
            "MODEL_ADAPTER_EMPTY",
            "adapter contains no LoRA factors",
            "Check that the adapter repository holds adapter_model.safetensors",
        ));
    }

    let scale = config.scale();
    let mut updated = 0;
    for (target, pair) in pairs {
        let (Some(a), Some(b)) = pair else {
            return Err(mismatch(
                format!("adapter is missing one LoRA factor for {target}"),
                "Re-export the adapter",
            ));
        };
        let base = base_weight(weights, &target)?;

        let merged = fold(base, a, b, scale).map_err(|e| {
            mismatch(
                format!("cannot merge adapter into {target}: {e}"),
                "Use the base model the adapter was trained on",
            )
        })?;
        weights.insert(target, merged);
        updated += 1;
    }

    for (target, tensor) in replacements {
        let base = base_weight(weights, &target)?;
        if base.dims() != tensor.dims() {
            return Err(mismatch(
                format!(
                    "saved module {target} has shape {:?}, base weight has {:?}",
                    tensor.dims(),
                    base.dims()
                ),
                "Use the base model the adapter was trained on",
            ));
        }

        let replacement = tensor.to_dtype(base.dtype()).map_err(|e| {
            mismatch(
                format!("cannot convert saved module {target}: {e}"),
                "Re-export the adapter",
            )
        })?;
        weights.insert(target, replacement);
        updated += 1;
    }

    Ok(updated)
}

fn base_weight<'a>(weights: &'a HashMap<String, Tensor>, target: &str) -> Result<&'a Tensor> {
    weights.get(target).ok_or_else(|| {
        mismatch(
            format!("adapter targets {target}, which the base model does not have"),
            "Use the base model the adapter was trained on",
        )
    })
}

fn fold(base: &Tensor, a: &Tensor, b: &Tensor, scale: f64) -> candle_core::Result<Tensor> {
    let dtype = base.dtype();
    let delta = b
        .to_dtype(DType::F32)?
        .matmul(&a.to_dtype(DType::F32)?)?
        .affine(scale, 0.0)?;
    base.to_dtype(DType::F32)?.add(&delta)?.to_dtype(dtype)
}
