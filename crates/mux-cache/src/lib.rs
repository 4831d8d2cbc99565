//! Cache-Control Planner (C5): a pure, side-effect-free function of
//! `(messages, tools, providerCapability)`. No I/O, no state. The planner
//! only decides where breakpoints go; sending them over the wire is the
//! provider transport's job.

/// Upper bound on breakpoints placed in a single request, independent of how
/// many placement rules actually fire.
pub const MAX_BREAKPOINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBreakpoint {
    /// The system/system-message position.
    SystemMessage,
    /// The last tool definition in the outgoing tool list; caches every tool
    /// up to and including it.
    ToolDefinition { index: usize },
    /// The second-to-last message in history; caches everything except the
    /// current (always-changing) user turn.
    Message { index: usize },
}

/// `message_count` and `tool_count` describe the outgoing request shape, not
/// any particular message/tool type, so this stays decoupled from
/// `mux-protocol`'s richer types.
pub fn plan_cache_breakpoints(
    message_count: usize,
    tool_count: usize,
    provider_supports_prompt_cache: bool,
) -> Vec<CacheBreakpoint> {
    if !provider_supports_prompt_cache {
        return Vec::new();
    }

    let mut breakpoints = Vec::with_capacity(3);
    breakpoints.push(CacheBreakpoint::SystemMessage);

    if tool_count > 0 {
        breakpoints.push(CacheBreakpoint::ToolDefinition {
            index: tool_count - 1,
        });
    }

    if message_count >= 2 {
        breakpoints.push(CacheBreakpoint::Message {
            index: message_count - 2,
        });
    }

    breakpoints.truncate(MAX_BREAKPOINTS);
    breakpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_op_when_provider_lacks_capability() {
        let breakpoints = plan_cache_breakpoints(10, 5, false);
        assert!(breakpoints.is_empty());
    }

    #[test]
    fn places_all_three_rules_when_applicable() {
        let breakpoints = plan_cache_breakpoints(10, 5, true);
        assert_eq!(
            breakpoints,
            vec![
                CacheBreakpoint::SystemMessage,
                CacheBreakpoint::ToolDefinition { index: 4 },
                CacheBreakpoint::Message { index: 8 },
            ]
        );
    }

    #[test]
    fn omits_tool_breakpoint_when_no_tools() {
        let breakpoints = plan_cache_breakpoints(10, 0, true);
        assert!(!breakpoints
            .iter()
            .any(|b| matches!(b, CacheBreakpoint::ToolDefinition { .. })));
    }

    #[test]
    fn omits_message_breakpoint_when_fewer_than_two_messages() {
        let breakpoints = plan_cache_breakpoints(1, 3, true);
        assert!(!breakpoints
            .iter()
            .any(|b| matches!(b, CacheBreakpoint::Message { .. })));
    }

    #[test]
    fn never_exceeds_the_cap_even_if_future_rules_add_more() {
        let breakpoints = plan_cache_breakpoints(10, 5, true);
        assert!(breakpoints.len() <= MAX_BREAKPOINTS);
    }
}
