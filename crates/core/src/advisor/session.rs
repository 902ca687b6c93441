//! Advisor session telemetry.
//!
//! Accumulates token counts, call counts, and a best-effort cost estimate
//! across one user session. Purely additive: nothing here ever feeds back
//! into control flow, and tracking never fails the caller.

use std::sync::Mutex;

use serde::Serialize;
use uuid::Uuid;

use super::llm::LlmUsage;

/// Per-million-token prices for models we can estimate. Unknown models
/// accumulate tokens but no cost.
const MODEL_PRICES: [(&str, f64, f64); 4] = [
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
];

/// Accumulated advisor usage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub api_calls: u64,
    pub total_cost: f64,
    /// False when at least one call used a model without a price entry.
    pub cost_complete: bool,
}

impl SessionStats {
    /// One-line summary for logs and CLI footers.
    pub fn summary(&self) -> String {
        format!(
            "{} tokens ({} in / {} out) • {} calls • ${:.4}",
            self.total_tokens, self.prompt_tokens, self.completion_tokens, self.api_calls,
            self.total_cost
        )
    }
}

/// Thread-safe accumulator for one session.
#[derive(Debug)]
pub struct SessionTracker {
    session_id: Uuid,
    stats: Mutex<SessionStats>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            stats: Mutex::new(SessionStats {
                cost_complete: true,
                ..Default::default()
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Record one advisor call.
    pub fn track(&self, model: &str, usage: &LlmUsage) {
        let mut stats = self.stats.lock().unwrap();
        stats.prompt_tokens += u64::from(usage.input_tokens);
        stats.completion_tokens += u64::from(usage.output_tokens);
        stats.total_tokens += u64::from(usage.input_tokens) + u64::from(usage.output_tokens);
        stats.api_calls += 1;

        match price_for(model) {
            Some((input_price, output_price)) => {
                stats.total_cost += f64::from(usage.input_tokens) / 1_000_000.0 * input_price
                    + f64::from(usage.output_tokens) / 1_000_000.0 * output_price;
            }
            None => stats.cost_complete = false,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().unwrap().clone()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn price_for(model: &str) -> Option<(f64, f64)> {
    MODEL_PRICES
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|(_, input, output)| (*input, *output))
}
