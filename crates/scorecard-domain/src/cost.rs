//! Token and dollar accounting values

use serde::{Deserialize, Serialize};

/// Per-million-token prices used to derive dollar cost from token usage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Dollars per million prompt tokens
    pub input_cost_per_million: f64,

    /// Dollars per million completion tokens
    pub output_cost_per_million: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_cost_per_million: 0.15,
            output_cost_per_million: 0.60,
        }
    }
}

impl ModelPricing {
    /// Cost of `tokens` prompt tokens
    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.input_cost_per_million / 1_000_000.0
    }

    /// Cost of `tokens` completion tokens
    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.output_cost_per_million / 1_000_000.0
    }
}

/// Which step of an element evaluation issued a model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// The element's own prompt
    Primary,
    /// The follow-up clarification rule
    Clarification,
}

/// One audited model call. Appended to a ledger history and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    /// Element that issued the call
    pub element_name: String,

    /// Step that issued the call
    pub call_kind: CallKind,

    /// Prompt tokens reported by the provider
    pub prompt_tokens: u64,

    /// Completion tokens reported by the provider
    pub completion_tokens: u64,

    /// Dollar cost of the prompt tokens
    pub input_cost: f64,

    /// Dollar cost of the completion tokens
    pub output_cost: f64,

    /// `input_cost + output_cost`
    pub total_cost: f64,
}

impl CostLedgerEntry {
    /// Price a call's token usage
    pub fn priced(
        element_name: impl Into<String>,
        call_kind: CallKind,
        prompt_tokens: u64,
        completion_tokens: u64,
        pricing: &ModelPricing,
    ) -> Self {
        let input_cost = pricing.input_cost(prompt_tokens);
        let output_cost = pricing.output_cost(completion_tokens);
        Self {
            element_name: element_name.into(),
            call_kind,
            prompt_tokens,
            completion_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}

/// Immutable running totals, attached to score results and rolled up per scorecard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    /// Number of model calls
    pub request_count: u64,

    /// Total prompt tokens
    pub prompt_tokens: u64,

    /// Total completion tokens
    pub completion_tokens: u64,

    /// Total prompt cost
    pub input_cost: f64,

    /// Total completion cost
    pub output_cost: f64,

    /// Total cost
    pub total_cost: f64,
}

impl CostSnapshot {
    /// Add one ledger entry to the totals
    pub fn add_entry(&mut self, entry: &CostLedgerEntry) {
        self.request_count += 1;
        self.prompt_tokens += entry.prompt_tokens;
        self.completion_tokens += entry.completion_tokens;
        self.input_cost += entry.input_cost;
        self.output_cost += entry.output_cost;
        self.total_cost += entry.total_cost;
    }

    /// Fold another snapshot into this one
    pub fn merge(&mut self, other: &CostSnapshot) {
        self.request_count += other.request_count;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
        self.total_cost += other.total_cost;
    }

    /// Whether no call has been accounted
    pub fn is_zero(&self) -> bool {
        self.request_count == 0 && self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}
