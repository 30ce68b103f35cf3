//! Simplifier engine: owns the shared model handle and serialises generation

use crate::{
    config::{EngineConfig, ModelSpec},
    generation::{validate_clause, GenerationParams},
    prompt::{extract_response, format_prompt},
    CoreError, Result,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::{fmt, sync::Arc, time::Instant};
use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// A loaded model able to continue a prompt.
///
/// Implementations return only the text produced after the prompt; prompt
/// tokens must never be echoed back.
pub trait TextGenerator: Send + Sync {
    /// Identifier of the compute backend in use, e.g. `cpu` or `cuda`
    fn device(&self) -> &str;

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Produces a [`TextGenerator`] from a model description. Loading blocks.
pub trait ModelLoader: Send + Sync {
    fn load(&self, spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>>;
}

/// Externally visible lifecycle of the model handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    /// Loading was never attempted or the engine has been torn down
    Idle,
    Loading,
    Ready { device: String },
    Failed { reason: String },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum ModelSlot {
    Idle,
    Loading,
    Ready(Arc<dyn TextGenerator>),
    Failed(String),
}

/// Process-wide owner of the model handle.
///
/// Lifecycle: created idle, moved to loading by [`SimplifierEngine::spawn_load`],
/// then ready or failed. [`SimplifierEngine::teardown`] drops the handle and
/// returns to idle. Handlers only read the slot.
pub struct SimplifierEngine {
    config: EngineConfig,
    slot: RwLock<ModelSlot>,
    permits: Semaphore,
}

impl SimplifierEngine {
    pub fn new(config: EngineConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_generations.max(1));
        Self {
            config,
            slot: RwLock::new(ModelSlot::Idle),
            permits,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn readiness(&self) -> Readiness {
        match &*self.slot.read() {
            ModelSlot::Idle => Readiness::Idle,
            ModelSlot::Loading => Readiness::Loading,
            ModelSlot::Ready(generator) => Readiness::Ready {
                device: generator.device().to_string(),
            },
            ModelSlot::Failed(reason) => Readiness::Failed {
                reason: reason.clone(),
            },
        }
    }

    pub fn mark_loading(&self) {
        *self.slot.write() = ModelSlot::Loading;
    }

    /// Install a loaded generator regardless of the current state.
    pub fn install(&self, generator: Arc<dyn TextGenerator>) {
        info!(device = generator.device(), "Model ready");
        *self.slot.write() = ModelSlot::Ready(generator);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        *self.slot.write() = ModelSlot::Failed(reason.into());
    }

    /// Drop the model handle. In-flight generations keep their own reference.
    pub fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.slot.write(), ModelSlot::Idle);
        if matches!(previous, ModelSlot::Ready(_)) {
            info!("Model handle released");
        }
    }

    /// Load the model on the blocking pool and report the outcome through the
    /// readiness state. Failures are logged, never propagated.
    pub fn spawn_load(
        self: &Arc<Self>,
        loader: Arc<dyn ModelLoader>,
        spec: ModelSpec,
    ) -> JoinHandle<()> {
        self.mark_loading();
        let engine = Arc::clone(self);

        tokio::spawn(async move {
            let started = Instant::now();
            info!(
                stage = "load",
                base_model = %spec.base_model_id,
                adapter = ?spec.adapter_model_id,
                device = %spec.device,
                "Loading model"
            );

            let outcome = tokio::task::spawn_blocking(move || loader.load(&spec))
                .await
                .map_err(|e| {
                    CoreError::model("MODEL_LOADER_PANICKED", e.to_string(), "Check the server logs")
                })
                .and_then(|result| result);

            engine.complete_load(outcome, started);
        })
    }

    fn complete_load(&self, outcome: Result<Arc<dyn TextGenerator>>, started: Instant) {
        let mut slot = self.slot.write();
        if !matches!(*slot, ModelSlot::Loading) {
            warn!(stage = "load", "Engine left the loading state, discarding load result");
            return;
        }

        match outcome {
            Ok(generator) => {
                info!(
                    stage = "load",
                    device = generator.device(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded successfully"
                );
                *slot = ModelSlot::Ready(generator);
            }
            Err(e) => {
                error!(stage = "load", code = e.code(), error = %e, "Error loading model");
                *slot = ModelSlot::Failed(e.message().to_string());
            }
        }
    }

    fn generator(&self) -> Result<Arc<dyn TextGenerator>> {
        match &*self.slot.read() {
            ModelSlot::Ready(generator) => Ok(Arc::clone(generator)),
            ModelSlot::Loading => Err(CoreError::model_unavailable(
                "MODEL_NOT_READY",
                "Model is still loading",
                "Retry once /health reports healthy",
            )),
            ModelSlot::Idle => Err(CoreError::model_unavailable(
                "MODEL_NOT_READY",
                "Model is not loaded",
                "Retry once /health reports healthy",
            )),
            ModelSlot::Failed(reason) => Err(CoreError::model_unavailable(
                "MODEL_LOAD_FAILED",
                format!("Model failed to load: {reason}"),
                "Check the server logs and restart the service",
            )),
        }
    }

    /// Validate, format, generate and extract.
    ///
    /// Invalid input is rejected before the model is consulted. At most
    /// `max_concurrent_generations` calls reach the generator at once.
    pub async fn simplify(&self, clause: &str, params: GenerationParams) -> Result<String> {
        validate_clause(clause)?;
        self.config.limits.validate(&params)?;

        let generator = self.generator()?;
        let _permit = self.permits.acquire().await.map_err(|_| {
            CoreError::model_unavailable(
                "MODEL_NOT_READY",
                "Generation queue is closed",
                "The service is shutting down",
            )
        })?;

        let prompt = format_prompt(clause);
        let started = Instant::now();
        debug!(
            stage = "inference",
            prompt_chars = prompt.len(),
            max_new_tokens = params.max_new_tokens,
            temperature = params.temperature,
            "Generating"
        );

        let raw = tokio::task::spawn_blocking(move || generator.generate(&prompt, &params))
            .await
            .map_err(|e| {
                CoreError::generation(
                    "GENERATION_TASK_PANICKED",
                    e.to_string(),
                    "Check the server logs",
                )
            })?
            .map_err(|e| {
                error!(stage = "inference", code = e.code(), error = %e, "Error during inference");
                e
            })?;

        let simplified = extract_response(&raw).to_string();
        info!(
            stage = "inference",
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_chars = simplified.len(),
            "Generation finished"
        );
        Ok(simplified)
    }
}

impl Default for SimplifierEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
