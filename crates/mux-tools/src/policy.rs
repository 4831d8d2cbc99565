//! Tool Policy: an ordered list of `{regex, action}` rules, first match
//! wins, default enable. A disabled tool invocation observed mid-stream is
//! answered with a synthesized disabled-tool-result so the model can
//! proceed without the real tool ever running.

use mux_protocol::PolicyAction;
use mux_protocol::ToolPolicyRule;
use regex::Regex;

struct CompiledRule {
    regex: Regex,
    action: PolicyAction,
}

#[derive(Default)]
pub struct ToolPolicy {
    rules: Vec<CompiledRule>,
}

impl ToolPolicy {
    /// Invalid regexes are dropped rather than raised, matching the
    /// System-Message Builder's treatment of invalid `Model:` patterns.
    pub fn compile(rules: &[ToolPolicyRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                Regex::new(&rule.pattern)
                    .ok()
                    .map(|regex| CompiledRule {
                        regex,
                        action: rule.action,
                    })
            })
            .collect();
        Self { rules }
    }

    pub fn is_enabled(&self, tool_name: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(tool_name))
            .map(|rule| matches!(rule.action, PolicyAction::Enable))
            .unwrap_or(true)
    }
}

pub fn disabled_tool_message(tool_name: &str) -> String {
    format!("Tool \"{tool_name}\" is disabled by policy and was not executed.")
}
