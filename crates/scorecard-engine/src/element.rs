//! Element evaluation over the chunks of the filtered input

use crate::chunking::ChunkSplitter;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::filter::apply_filters;
use crate::ledger::CostLedger;
use crate::parser::{parse_response, ParsedResponse, StructuredAnswer};
use crate::prompt::PromptBuilder;
use crate::retry::call_with_retry;
use scorecard_domain::{
    Answer, CallKind, ChunkingPolicy, CostLedgerEntry, CostSnapshot, Element, ElementOutcome,
    Message, Metadata, ModelProvider, ScoreDefinition,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// Explanation attached to outcomes whose reply was withheld by the provider
pub const CONTENT_FILTERED_EXPLANATION: &str =
    "The provider withheld the reply (content filter); treated as a negative answer.";

/// Everything an element evaluation reads besides the element itself
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Filtered input text
    pub input: Arc<str>,
    /// Caller metadata, available to prompt templates
    pub metadata: Arc<Metadata>,
    /// Chunking policy of the owning score
    pub chunking: ChunkingPolicy,
    /// Ledger of the owning score
    pub ledger: CostLedger,
}

impl EvaluationContext {
    /// Create a context from already-filtered input
    pub fn new(
        input: impl Into<Arc<str>>,
        metadata: Arc<Metadata>,
        chunking: ChunkingPolicy,
        ledger: CostLedger,
    ) -> Self {
        Self {
            input: input.into(),
            metadata,
            chunking,
            ledger,
        }
    }

    /// Create a context for one score: applies its filters and takes its chunking policy
    pub fn for_score(
        definition: &ScoreDefinition,
        raw_text: &str,
        metadata: Arc<Metadata>,
        ledger: CostLedger,
    ) -> Self {
        let filtered = apply_filters(&definition.filters, raw_text);
        Self::new(filtered, metadata, definition.chunking, ledger)
    }
}

/// Evaluates one element across all chunks of the filtered input
///
/// Chunks are dispatched to a pool bounded by `chunk_concurrency`. Provider calls
/// block, so each runs on the blocking thread pool. The first affirmative chunk
/// decides the element; chunk calls already in flight run to completion and still
/// record into the ledger, while queued ones are skipped.
pub struct ElementEvaluator<P> {
    provider: Arc<P>,
    config: Arc<EngineConfig>,
}

impl<P> Clone for ElementEvaluator<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: Arc::clone(&self.config),
        }
    }
}

impl<P> ElementEvaluator<P>
where
    P: ModelProvider + Send + Sync + 'static,
{
    /// Create a new evaluator
    pub fn new(provider: Arc<P>, config: Arc<EngineConfig>) -> Self {
        Self { provider, config }
    }

    /// Engine configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate an element against the filtered input
    pub async fn evaluate(
        &self,
        element: &Element,
        ctx: &EvaluationContext,
    ) -> Result<ElementOutcome, EngineError> {
        if Element::is_builtin(&element.name) {
            return Ok(builtin_outcome(element, &ctx.input));
        }

        let chunks = self.chunks(ctx);
        debug!("Evaluating element '{}' over {} chunk(s)", element.name, chunks.len());

        let element = Arc::new(element.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.chunk_concurrency.max(1)));
        let decided = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel::<ChunkReport>();

        let chunk_count = chunks.len();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let job = ChunkJob {
                provider: Arc::clone(&self.provider),
                config: Arc::clone(&self.config),
                element: Arc::clone(&element),
                metadata: Arc::clone(&ctx.metadata),
                ledger: ctx.ledger.clone(),
                chunk,
                index,
            };
            let semaphore = Arc::clone(&semaphore);
            let decided = Arc::clone(&decided);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if decided.load(Ordering::Acquire) {
                    let _ = tx.send((index, None));
                    return;
                }

                let report = tokio::task::spawn_blocking(move || job.run())
                    .await
                    .map_err(EngineError::from)
                    .and_then(|result| result);
                // The receiver is gone once the element has been decided
                let _ = tx.send((index, Some(report)));
            });
        }
        drop(tx);

        let mut outcomes: Vec<Option<ElementOutcome>> = vec![None; chunk_count];
        let mut errors: Vec<(usize, EngineError)> = Vec::new();

        while let Some((index, report)) = rx.recv().await {
            match report {
                Some(Ok(outcome)) if outcome.is_affirmative() => {
                    decided.store(true, Ordering::Release);
                    debug!("Element '{}' decided by chunk {}", element.name, index);
                    return Ok(outcome);
                }
                Some(Ok(outcome)) => outcomes[index] = Some(outcome),
                Some(Err(e)) => {
                    warn!("Chunk {} of element '{}' failed: {}", index, element.name, e);
                    errors.push((index, e));
                }
                None => {}
            }
        }

        if let Some((_, error)) = errors.into_iter().min_by_key(|(index, _)| *index) {
            return Err(error);
        }

        let clarified = outcomes
            .iter()
            .position(|outcome| outcome.as_ref().is_some_and(|o| o.clarified));
        let representative = match clarified {
            Some(index) => outcomes.swap_remove(index),
            None => outcomes.into_iter().flatten().next(),
        };

        representative.ok_or_else(|| {
            EngineError::Evaluation(anyhow::anyhow!(
                "no chunk of element '{}' produced an outcome",
                element.name
            ))
        })
    }

    fn chunks(&self, ctx: &EvaluationContext) -> Vec<String> {
        if !ctx.chunking.enabled {
            return vec![ctx.input.trim_end().to_string()];
        }

        let max_chunk_size = ctx
            .chunking
            .max_chunk_size
            .unwrap_or(self.config.default_max_chunk_size);
        ChunkSplitter::with_delimiter(max_chunk_size, self.config.chunk_delimiter.as_str())
            .split(&ctx.input)
    }
}

fn builtin_outcome(element: &Element, input: &str) -> ElementOutcome {
    let empty = input.trim().is_empty();
    let explanation = if empty {
        "The filtered input is empty."
    } else {
        "The filtered input is not empty."
    };

    ElementOutcome {
        element: element.name.clone(),
        value: if empty { Answer::Yes } else { Answer::No },
        explanation: explanation.to_string(),
        quote: String::new(),
        original_explanation: None,
        clarified: false,
        chunk_index: None,
        chat_history_excerpt: Vec::new(),
        cost_delta: CostSnapshot::default(),
    }
}

/// Chunk index with its outcome; `None` when the job was skipped after the decision
type ChunkReport = (usize, Option<Result<ElementOutcome, EngineError>>);

/// One chunk's evaluation, run on a blocking worker thread
struct ChunkJob<P> {
    provider: Arc<P>,
    config: Arc<EngineConfig>,
    element: Arc<Element>,
    metadata: Arc<Metadata>,
    ledger: CostLedger,
    chunk: String,
    index: usize,
}

impl<P: ModelProvider> ChunkJob<P> {
    fn run(self) -> Result<ElementOutcome, EngineError> {
        let builder = PromptBuilder::new(
            self.config.system_prompt.as_deref(),
            &self.chunk,
            &self.metadata,
        );
        let mut cost = CostSnapshot::default();

        let mut conversation = builder.primary(&self.element.prompt);
        let (primary, reply) = self.ask(&conversation, CallKind::Primary, &mut cost)?;

        let mut outcome = ElementOutcome {
            element: self.element.name.clone(),
            value: primary.answer,
            explanation: primary.explanation,
            quote: primary.quote,
            original_explanation: None,
            clarified: false,
            chunk_index: Some(self.index),
            chat_history_excerpt: Vec::new(),
            cost_delta: CostSnapshot::default(),
        };

        match self.element.clarification_rule.as_deref() {
            Some(rule) if outcome.value == Answer::Yes => {
                conversation = builder.clarification(conversation, &reply, rule);
                let (clarification, reply) =
                    self.ask(&conversation, CallKind::Clarification, &mut cost)?;
                conversation.push(Message::assistant(reply));
                outcome.clarified = true;

                if clarification.answer == Answer::No {
                    debug!(
                        "Clarification overrode chunk {} of element '{}'",
                        self.index, self.element.name
                    );
                    outcome.value = Answer::No;
                    let primary_explanation =
                        std::mem::replace(&mut outcome.explanation, clarification.explanation);
                    outcome.original_explanation = Some(primary_explanation);
                    if !clarification.quote.is_empty() {
                        outcome.quote = clarification.quote;
                    }
                }
            }
            _ => conversation.push(Message::assistant(reply)),
        }

        outcome.chat_history_excerpt = conversation;
        outcome.cost_delta = cost;
        Ok(outcome)
    }

    /// One model call: retried, recorded, then parsed with at most one repair
    fn ask(
        &self,
        conversation: &[Message],
        kind: CallKind,
        cost: &mut CostSnapshot,
    ) -> Result<(StructuredAnswer, String), EngineError> {
        let completion = call_with_retry(
            self.provider.as_ref(),
            conversation,
            &self.config.completion,
            &self.config.retry,
        )?;

        let entry = CostLedgerEntry::priced(
            self.element.name.clone(),
            kind,
            completion.prompt_tokens,
            completion.completion_tokens,
            &self.config.pricing,
        );
        cost.add_entry(&entry);
        self.ledger.record(entry);

        if completion.is_content_filtered() {
            warn!(
                "Content filter triggered for chunk {} of element '{}'",
                self.index, self.element.name
            );
            let answer = StructuredAnswer {
                answer: Answer::No,
                explanation: CONTENT_FILTERED_EXPLANATION.to_string(),
                quote: String::new(),
            };
            return Ok((answer, completion.content));
        }

        let answer = match parse_response(&completion.content) {
            ParsedResponse::Parsed(answer) => answer,
            ParsedResponse::Repairable(repairable) => {
                warn!(
                    "Repairing malformed reply for element '{}' chunk {}: {}",
                    self.element.name,
                    self.index,
                    repairable.reason()
                );
                repairable.repair()?
            }
        };

        Ok((answer, completion.content))
    }
}
