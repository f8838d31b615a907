use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// USD per one million tokens (input, output)
const MODEL_PRICES: &[(&str, f64, f64)] = &[
    ("mistral-small-latest", 0.2, 0.6),
    ("mistral-medium-latest", 0.4, 2.0),
    ("mistral-large-latest", 2.0, 6.0),
    ("open-mistral-nemo", 0.15, 0.15),
    ("ministral-8b-latest", 0.1, 0.1),
    ("ministral-3b-latest", 0.04, 0.04),
];

/// Price for models missing from the table
const FALLBACK_PRICE: (f64, f64) = (2.0, 6.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    /// Exact match first, then the longest table entry sharing a prefix with `model`
    /// (`mistral-small-2409` prices as `mistral-small-latest`).
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        let (input, output) = MODEL_PRICES
            .iter()
            .find(|(name, _, _)| *name == model)
            .or_else(|| {
                MODEL_PRICES
                    .iter()
                    .filter(|(name, _, _)| {
                        let family = name.trim_end_matches("-latest");
                        model.starts_with(family)
                    })
                    .max_by_key(|(name, _, _)| name.len())
            })
            .map(|(_, input, output)| (*input, *output))
            .unwrap_or(FALLBACK_PRICE);
        Self {
            input_per_million: input,
            output_per_million: output,
        }
    }

    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Accumulates token usage and USD cost per model. In-memory only.
#[derive(Debug, Default)]
pub struct CostTracker {
    usage: Mutex<HashMap<String, ModelUsage>>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call and returns its cost in USD.
    pub fn track_usage(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let cost = ModelPrice::for_model(model).cost(input_tokens, output_tokens);
        let mut usage = self.usage.lock().unwrap();
        let entry = usage.entry(model.to_string()).or_default();
        entry.calls += 1;
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;
        entry.cost_usd += cost;
        debug!(model, input_tokens, output_tokens, cost_usd = cost, "Tracked LLM usage");
        cost
    }

    pub fn usage(&self, model: &str) -> Option<ModelUsage> {
        self.usage.lock().unwrap().get(model).cloned()
    }

    pub fn all_usage(&self) -> HashMap<String, ModelUsage> {
        self.usage.lock().unwrap().clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.usage.lock().unwrap().values().map(|u| u.cost_usd).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage
            .lock()
            .unwrap()
            .values()
            .map(|u| u.input_tokens + u.output_tokens)
            .sum()
    }

    /// One line per model plus a total, sorted by model name.
    pub fn summary(&self) -> String {
        let usage = self.all_usage();
        if usage.is_empty() {
            return "No LLM usage recorded".to_string();
        }
        let mut models: Vec<_> = usage.into_iter().collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));

        let mut lines: Vec<String> = models
            .iter()
            .map(|(model, u)| {
                format!(
                    "{}: {} calls, {} input / {} output tokens, ${:.6}",
                    model, u.calls, u.input_tokens, u.output_tokens, u.cost_usd
                )
            })
            .collect();
        lines.push(format!(
            "Total: {} tokens, ${:.6}",
            self.total_tokens(),
            self.total_cost()
        ));
        lines.join("\n")
    }

    pub fn reset(&self) {
        self.usage.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_lookup() {
        let small = ModelPrice::for_model("mistral-small-latest");
        assert_eq!(small.input_per_million, 0.2);
        let dated = ModelPrice::for_model("mistral-small-2409");
        assert_eq!(dated, small);
        let unknown = ModelPrice::for_model("some-other-model");
        assert_eq!(unknown.input_per_million, FALLBACK_PRICE.0);
    }

    #[test]
    fn test_usage_accumulates_per_model() {
        let tracker = CostTracker::new();
        let first = tracker.track_usage("mistral-small-latest", 1_000_000, 500_000);
        assert!((first - 0.5).abs() < 1e-9);
        tracker.track_usage("mistral-small-latest", 1_000, 1_000);
        tracker.track_usage("mistral-large-latest", 10, 10);

        let small = tracker.usage("mistral-small-latest").unwrap();
        assert_eq!(small.calls, 2);
        assert_eq!(small.input_tokens, 1_001_000);
        assert_eq!(tracker.total_tokens(), 1_001_000 + 501_000 + 20);
        assert!(tracker.summary().contains("mistral-large-latest: 1 calls"));

        tracker.reset();
        assert_eq!(tracker.total_cost(), 0.0);
        assert_eq!(tracker.summary(), "No LLM usage recorded");
    }
}
