use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// Token usage for a single model turn. All counters are best-effort: providers
/// differ in which of these they report, so every field is optional rather than
/// defaulted to zero (a missing `cached_tokens` is not the same claim as zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub cache_create_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn add(&self, other: &TokenUsage) -> TokenUsage {
        fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }
        }
        TokenUsage {
            input_tokens: add_opt(self.input_tokens, other.input_tokens),
            output_tokens: add_opt(self.output_tokens, other.output_tokens),
            cached_tokens: add_opt(self.cached_tokens, other.cached_tokens),
            cache_create_tokens: add_opt(self.cache_create_tokens, other.cache_create_tokens),
            reasoning_tokens: add_opt(self.reasoning_tokens, other.reasoning_tokens),
        }
    }

    pub fn sum<'a>(usages: impl IntoIterator<Item = &'a TokenUsage>) -> TokenUsage {
        usages
            .into_iter()
            .fold(TokenUsage::default(), |acc, u| acc.add(u))
    }
}

/// Provider-reported rate limit headroom, tracked alongside usage but never
/// gating core behavior: an LLM multiplexer running many concurrent workspaces
/// against one provider key needs this to avoid naive concurrent-retry storms,
/// but its absence changes no correctness invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema, TS)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSnapshot {
    pub requests_remaining: Option<u64>,
    pub tokens_remaining: Option<u64>,
    pub resets_in_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_preserves_none_when_both_none() {
        let a = TokenUsage::default();
        let b = TokenUsage::default();
        assert_eq!(a.add(&b).input_tokens, None);
    }

    #[test]
    fn add_sums_present_fields() {
        let a = TokenUsage {
            input_tokens: Some(10),
            ..Default::default()
        };
        let b = TokenUsage {
            input_tokens: Some(5),
            output_tokens: Some(2),
            ..Default::default()
        };
        let sum = a.add(&b);
        assert_eq!(sum.input_tokens, Some(15));
        assert_eq!(sum.output_tokens, Some(2));
    }

    #[test]
    fn sum_over_empty_iterator_is_default() {
        let usages: Vec<TokenUsage> = vec![];
        assert_eq!(TokenUsage::sum(&usages), TokenUsage::default());
    }
}
