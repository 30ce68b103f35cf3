//! Gemma generator on candle
//!
//! Weights, tokenizer and adapter come from the Hugging Face hub through
//! `hf-hub`, which reuses the local cache when the files are already present.

use super::lora::{merge_lora, LoraConfig};
use crate::{
    config::{DevicePreference, ModelSpec},
    engine::{ModelLoader, TextGenerator},
    generation::GenerationParams,
    prompt::END_OF_TURN,
    CoreError, Result,
};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::{
    generation::LogitsProcessor,
    models::gemma::{Config as GemmaConfig, Model as GemmaModel},
};
use hf_hub::{
    api::sync::{Api, ApiBuilder, ApiRepo},
    Repo, RepoType,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Environment variable holding the hub access token for gated models
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

const EOS_TOKEN: &str = "<eos>";

/// Loads the base model, merges the adapter and builds a [`CandleGenerator`]
pub struct CandleLoader {
    token: Option<String>,
}

impl CandleLoader {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Read the hub token from `HF_TOKEN`. A missing token is not fatal since
    /// the weights may already sit in the local cache.
    pub fn from_env() -> Self {
        let token = std::env::var(HF_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());
        if token.is_none() {
            warn!(
                "{HF_TOKEN_ENV} environment variable is not set. Gated models like Gemma might fail to download unless already cached."
            );
        }
        Self::new(token)
    }

    fn api(&self) -> Result<Api> {
        ApiBuilder::new()
            .with_token(self.token.clone())
            .build()
            .map_err(|e| {
                CoreError::model(
                    "MODEL_HUB_UNAVAILABLE",
                    format!("cannot create hub client: {e}"),
                    "Check HOME and HF_HOME permissions",
                )
            })
    }
}

impl ModelLoader for CandleLoader {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>> {
        spec.validate()?;
        let device = select_device(spec.device)?;
        let label = device_label(&device);
        info!(stage = "load", device = label, "Using device");

        let api = self.api()?;
        info!(stage = "load", model = %spec.base_model_id, "Loading base model");
        let repo = api.repo(Repo::with_revision(
            spec.base_model_id.clone(),
            RepoType::Model,
            spec.revision.clone(),
        ));

        let tokenizer_path = fetch(&repo, "tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            CoreError::model(
                "MODEL_TOKENIZER_INVALID",
                format!("cannot read {}: {e}", tokenizer_path.display()),
                "Delete the cached tokenizer.json and retry",
            )
        })?;

        let config_path = fetch(&repo, "config.json")?;
        let config: GemmaConfig = read_json(&config_path)?;

        let dtype = if device.is_cuda() {
            DType::F16
        } else {
            DType::F32
        };

        let mut tensors = HashMap::new();
        for path in weight_files(&repo)? {
            debug!(stage = "load", file = %path.display(), "Reading weights");
            let shard = candle_core::safetensors::load(&path, &device).map_err(|e| {
                CoreError::model(
                    "MODEL_WEIGHTS_INVALID",
                    format!("cannot read {}: {e}", path.display()),
                    "Delete the cached weights and retry",
                )
            })?;
            tensors.extend(shard);
        }

        if let Some(adapter_id) = &spec.adapter_model_id {
            info!(stage = "load", adapter = %adapter_id, "Loading adapter");
            let adapter_repo = api.model(adapter_id.clone());
            let adapter_config: LoraConfig =
                read_json(&fetch(&adapter_repo, "adapter_config.json")?)?;
            let adapter_path = fetch(&adapter_repo, "adapter_model.safetensors")?;
            let adapter = candle_core::safetensors::load(&adapter_path, &device).map_err(|e| {
                CoreError::model(
                    "MODEL_ADAPTER_INVALID",
                    format!("cannot read {}: {e}", adapter_path.display()),
                    "Delete the cached adapter and retry",
                )
            })?;
            let merged = merge_lora(&mut tensors, &adapter, &adapter_config)?;
            info!(stage = "load", layers = merged, "Adapter merged");
        }

        let vb = VarBuilder::from_tensors(tensors, dtype, &device);
        let model = GemmaModel::new(false, &config, vb).map_err(|e| {
            CoreError::model(
                "MODEL_BUILD_FAILED",
                format!("cannot build Gemma model: {e}"),
                "Check that the base model is a Gemma checkpoint",
            )
        })?;

        let generator = CandleGenerator::new(model, tokenizer, device, spec.seed)?;
        Ok(Arc::new(generator))
    }
}

/// Gemma model plus tokenizer, safe to share across requests
pub struct CandleGenerator {
    /// The KV cache makes the forward pass stateful
    model: Mutex<GemmaModel>,
    tokenizer: Tokenizer,
    device: Device,
    label: &'static str,
    stop_tokens: Vec<u32>,
    seed: Option<u64>,
    requests: AtomicU64,
}

impl CandleGenerator {
    pub fn new(
        model: GemmaModel,
        tokenizer: Tokenizer,
        device: Device,
        seed: Option<u64>,
    ) -> Result<Self> {
        let eos = tokenizer.token_to_id(EOS_TOKEN).ok_or_else(|| {
            CoreError::model(
                "MODEL_TOKENIZER_INVALID",
                format!("tokenizer has no {EOS_TOKEN} token"),
                "Use the tokenizer shipped with the base model",
            )
        })?;
        let mut stop_tokens = vec![eos];
        if let Some(end_of_turn) = tokenizer.token_to_id(END_OF_TURN) {
            stop_tokens.push(end_of_turn);
        }

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            label: device_label(&device),
            device,
            stop_tokens,
            seed,
            requests: AtomicU64::new(0),
        })
    }

    fn next_seed(&self) -> u64 {
        let request = self.requests.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => seed.wrapping_add(request),
            None => rand::random(),
        }
    }

    fn sample(&self, prompt_ids: &[u32], params: &GenerationParams) -> candle_core::Result<Vec<u32>> {
        let mut model = self.model.lock();
        model.clear_kv_cache();

        let mut processor = LogitsProcessor::new(self.next_seed(), Some(params.temperature), None);
        let mut generated = Vec::with_capacity(params.max_new_tokens);
        let mut input = prompt_ids.to_vec();
        let mut offset = 0;

        for _ in 0..params.max_new_tokens {
            let context = Tensor::new(input.as_slice(), &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&context, offset)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
            offset += input.len();

            let next = processor.sample(&logits)?;
            if self.stop_tokens.contains(&next) {
                break;
            }
            generated.push(next);
            input = vec![next];
        }

        Ok(generated)
    }
}

impl TextGenerator for CandleGenerator {
    fn device(&self) -> &str {
        self.label
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let encoding = self.tokenizer.encode(prompt, true).map_err(|e| {
            CoreError::generation("GENERATION_FAILED", e.to_string(), "Check the clause text")
        })?;
        let prompt_ids = encoding.get_ids();

        let generated = self.sample(prompt_ids, params).map_err(|e| {
            CoreError::generation(
                "GENERATION_FAILED",
                e.to_string(),
                "Lower max_new_tokens or retry",
            )
        })?;
        debug!(
            stage = "inference",
            prompt_tokens = prompt_ids.len(),
            new_tokens = generated.len(),
            "Sampling finished"
        );

        // Only the continuation is decoded; prompt tokens are never echoed
        self.tokenizer.decode(&generated, true).map_err(|e| {
            CoreError::generation("GENERATION_FAILED", e.to_string(), "Retry the request")
        })
    }
}

/// Resolve the configured preference to a concrete device
pub fn select_device(preference: DevicePreference) -> Result<Device> {
    let device = match preference {
        DevicePreference::Auto => Device::cuda_if_available(0),
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Cuda => Device::new_cuda(0),
        DevicePreference::Metal => Device::new_metal(0),
    };
    device.map_err(|e| {
        CoreError::model(
            "MODEL_DEVICE_UNAVAILABLE",
            format!("cannot open {preference} device: {e}"),
            "Set model.device to auto or cpu",
        )
    })
}

pub fn device_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}

fn fetch(repo: &ApiRepo, file: &str) -> Result<PathBuf> {
    repo.get(file).map_err(|e| {
        CoreError::model(
            "MODEL_DOWNLOAD_FAILED",
            format!("cannot fetch {file}: {e}"),
            "Set HF_TOKEN for gated repositories or check network access",
        )
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        CoreError::model(
            "MODEL_FILE_UNREADABLE",
            format!("cannot read {}: {e}", path.display()),
            "Check the hub cache directory",
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        CoreError::model(
            "MODEL_CONFIG_INVALID",
            format!("cannot parse {}: {e}", path.display()),
            "Delete the cached file and retry",
        )
    })
}

#[derive(Deserialize)]
struct SafetensorsIndex {
    weight_map: HashMap<String, String>,
}

const INDEX_FILE: &str = "model.safetensors.index.json";
const SINGLE_FILE: &str = "model.safetensors";

/// What to do when the shard index could not be fetched
#[derive(Debug, PartialEq, Eq)]
enum MissingIndex {
    /// The repository has no index, so it ships a single file
    SingleFile,
    /// The repository listing is unavailable (offline or unauthorised); the
    /// single file may still be cached
    TrySingleFile,
    /// The index exists, so the fetch failure is real
    Fail,
}

fn on_missing_index(listing: Option<&[String]>) -> MissingIndex {
    match listing {
        Some(files) if files.iter().any(|file| file == INDEX_FILE) => MissingIndex::Fail,
        Some(_) => MissingIndex::SingleFile,
        None => MissingIndex::TrySingleFile,
    }
}

/// Sharded checkpoints list their files in an index; small ones ship a
/// single `model.safetensors`. Only a missing index falls back to the single
/// file; any other failure is reported as the index fetch error.
fn weight_files(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    let index_error = match fetch(repo, INDEX_FILE) {
        Ok(index_path) => {
            let index: SafetensorsIndex = read_json(&index_path)?;
            let shards: BTreeSet<String> = index.weight_map.into_values().collect();
            return shards.iter().map(|shard| fetch(repo, shard)).collect();
        }
        Err(e) => e,
    };

    let listing: Option<Vec<String>> = repo
        .info()
        .ok()
        .map(|info| info.siblings.into_iter().map(|s| s.rfilename).collect());

    match on_missing_index(listing.as_deref()) {
        MissingIndex::SingleFile => Ok(vec![fetch(repo, SINGLE_FILE)?]),
        MissingIndex::TrySingleFile => fetch(repo, SINGLE_FILE)
            .map(|path| vec![path])
            .map_err(|_| index_error),
        MissingIndex::Fail => Err(index_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device_selection() {
        let device = select_device(DevicePreference::Cpu).unwrap();
        assert_eq!(device_label(&device), "cpu");
    }

    #[test]
    fn test_missing_index_fallback() {
        let single = vec!["config.json".to_string(), SINGLE_FILE.to_string()];
        assert_eq!(on_missing_index(Some(single.as_slice())), MissingIndex::SingleFile);

        let sharded = vec![
            INDEX_FILE.to_string(),
            "model-00001-of-00002.safetensors".to_string(),
        ];
        assert_eq!(on_missing_index(Some(sharded.as_slice())), MissingIndex::Fail);

        // Gated or offline: the listing itself is unavailable
        assert_eq!(on_missing_index(None), MissingIndex::TrySingleFile);
    }

    #[test]
    fn test_explicit_token_is_kept() {
        let loader = CandleLoader::new(Some("hf_test".to_string()));
        assert_eq!(loader.token.as_deref(), Some("hf_test"));
    }
}
