//! Attempt and fallback loop shared by the generation pipelines
//!
//! Each request walks a small state machine:
//!
//! ```text
//! Drafting -> AwaitingModel -> Validating -> Done
//!                  ^               |
//!                  |               v
//!              Correcting <--- (schema error, attempts left)
//!
//! transport error / attempts used up -> Exhausted -> next model (Drafting) or give up
//! ```
//!
//! Pipelines differ only in their [`GenerationTask`] (prompts and output
//! validation) and [`RetryPolicy`] (model list, attempts, and whether a
//! transport error moves to the next model or ends the run).

use super::capabilities::{ChatMessage, CompletionProvider, UpstreamError};
use super::error::PuzzleResult;
use super::prompts::with_correction;
use super::schema::SchemaError;
use super::{cancellable, truncate_for_log};
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prompts and validation for one pipeline
pub trait GenerationTask {
    type Output;

    /// Pipeline name for logs
    fn name(&self) -> &'static str;

    /// Initial messages for a fresh model
    fn draft(&self) -> Vec<ChatMessage>;

    fn validate(&self, output: &str) -> Result<Self::Output, SchemaError>;

    /// User turn asking the model to fix `error`
    fn correction(&self, error: &SchemaError) -> String;
}

/// What a transport failure does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPolicy {
    /// Stop immediately; later models are not tried
    Abort,
    /// Abandon the current model and continue with the next
    NextModel,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Models in order; `None` is the provider's default model
    pub models: Vec<Option<String>>,
    pub attempts_per_model: usize,
    pub on_transport_error: TransportPolicy,
}

/// Last failure seen by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Transport(UpstreamError),
    Schema(SchemaError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Transport(e) => write!(f, "completion request failed: {}", e),
            Failure::Schema(e) => write!(f, "invalid model output: {}", e),
        }
    }
}

/// Outcome of a run
#[derive(Debug)]
pub enum Generated<T> {
    Done {
        value: T,
        model: String,
        attempts: usize,
    },
    Exhausted {
        attempts: usize,
        last_error: Option<Failure>,
    },
}

enum Phase<T> {
    Drafting,
    AwaitingModel,
    Validating(String),
    Correcting { output: String, error: SchemaError },
    Exhausted,
    Done(T),
}

/// Model, transcript and attempt count for the model currently in use
struct AttemptState {
    model: Option<String>,
    messages: Vec<ChatMessage>,
    attempt: usize,
}

impl AttemptState {
    fn new(model: Option<String>) -> Self {
        Self {
            model,
            messages: Vec::new(),
            attempt: 0,
        }
    }

    fn model_name<'a>(&'a self, completion: &'a dyn CompletionProvider) -> &'a str {
        self.model
            .as_deref()
            .unwrap_or_else(|| completion.default_model())
    }
}

/// Drive `task` through `policy` against `completion`.
///
/// Only cancellation is an `Err`; running out of models and attempts is
/// reported as [`Generated::Exhausted`] so each pipeline picks its own
/// degradation.
pub async fn run<G: GenerationTask>(
    task: &G,
    completion: &dyn CompletionProvider,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> PuzzleResult<Generated<G::Output>> {
    let started = Instant::now();
    let mut models = policy.models.iter().cloned();
    let mut total_attempts = 0usize;
    let mut last_error: Option<Failure> = None;

    let Some(first) = models.next() else {
        return Ok(Generated::Exhausted {
            attempts: 0,
            last_error: None,
        });
    };
    let mut state = AttemptState::new(first);
    let mut phase = Phase::Drafting;

    loop {
        phase = match phase {
            Phase::Drafting => {
                state.messages = task.draft();
                Phase::AwaitingModel
            }

            Phase::AwaitingModel => {
                state.attempt += 1;
                total_attempts += 1;
                let call_started = Instant::now();
                let call = async {
                    match state.model.as_deref() {
                        Some(model) => completion.complete_with_model(model, &state.messages).await,
                        None => completion.complete(&state.messages).await,
                    }
                };
                let response = cancellable(cancel, call).await?;

                match response {
                    Ok(output) => {
                        debug!(
                            pipeline = task.name(),
                            model = state.model_name(completion),
                            attempt = state.attempt,
                            elapsed_ms = call_started.elapsed().as_millis() as u64,
                            output = truncate_for_log(&output),
                            "Completion received"
                        );
                        Phase::Validating(output)
                    }
                    Err(e) => {
                        warn!(
                            pipeline = task.name(),
                            model = state.model_name(completion),
                            attempt = state.attempt,
                            error = %e,
                            "Completion request failed"
                        );
                        last_error = Some(Failure::Transport(e));
                        match policy.on_transport_error {
                            TransportPolicy::Abort => break,
                            TransportPolicy::NextModel => Phase::Exhausted,
                        }
                    }
                }
            }

            Phase::Validating(output) => match task.validate(&output) {
                Ok(value) => Phase::Done(value),
                Err(error) => {
                    warn!(
                        pipeline = task.name(),
                        model = state.model_name(completion),
                        attempt = state.attempt,
                        error = %error,
                        output = truncate_for_log(&output),
                        "Model output rejected"
                    );
                    last_error = Some(Failure::Schema(error.clone()));
                    if state.attempt < policy.attempts_per_model {
                        Phase::Correcting { output, error }
                    } else {
                        Phase::Exhausted
                    }
                }
            },

            Phase::Correcting { output, error } => {
                let messages = std::mem::take(&mut state.messages);
                state.messages = with_correction(messages, &output, task.correction(&error));
                Phase::AwaitingModel
            }

            Phase::Exhausted => match models.next() {
                Some(next) => {
                    info!(
                        pipeline = task.name(),
                        from = state.model_name(completion),
                        to = next.as_deref().unwrap_or_else(|| completion.default_model()),
                        "Falling back to next model"
                    );
                    state = AttemptState::new(next);
                    Phase::Drafting
                }
                None => break,
            },

            Phase::Done(value) => {
                let model = state.model_name(completion).to_string();
                info!(
                    pipeline = task.name(),
                    model = %model,
                    attempts = total_attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generation succeeded"
                );
                return Ok(Generated::Done {
                    value,
                    model,
                    attempts: total_attempts,
                });
            }
        };
    }

    Ok(Generated::Exhausted {
        attempts: total_attempts,
        last_error,
    })
}
