//! Six-step system-message composition (§4.4): prelude, environment block,
//! `<custom-instructions>`, `<mode-*>`, `<model-*>`, `<additional-instructions>`.

use crate::sections::compile_model_pattern;
use crate::sections::parse;
use crate::sections::InstructionDocument;

const PRELUDE: &str = "\
You are operating inside an orchestrated coding workspace. Respond with \
plain text, reasoning, and tool calls as appropriate; do not wrap output \
in markdown code fences unless the content itself is code.";

pub struct SystemMessageInputs<'a> {
    pub working_directory: &'a str,
    pub isolation_contract: &'a str,
    pub global_instructions: Option<&'a str>,
    pub context_instructions: Option<&'a str>,
    pub active_mode: Option<&'a str>,
    pub active_model: &'a str,
    pub additional_instructions: Option<&'a str>,
}

pub fn build_system_message(inputs: SystemMessageInputs<'_>) -> String {
    let global = inputs.global_instructions.map(parse).unwrap_or_default();
    let context = inputs.context_instructions.map(parse).unwrap_or_default();

    let mut sections = Vec::new();

    sections.push(PRELUDE.to_string());
    sections.push(environment_block(inputs.working_directory, inputs.isolation_contract));

    if let Some(custom) = custom_instructions_block(&global, &context) {
        sections.push(custom);
    }

    if let Some(name) = inputs.active_mode {
        if let Some(block) = mode_block(name, &context, &global) {
            sections.push(block);
        }
    }

    if let Some(block) = model_block(inputs.active_model, &context, &global) {
        sections.push(block);
    }

    if let Some(additional) = inputs.additional_instructions {
        if !additional.trim().is_empty() {
            sections.push(format!(
                "<additional-instructions>\n{}\n</additional-instructions>",
                additional.trim()
            ));
        }
    }

    sections.join("\n\n")
}

fn environment_block(working_directory: &str, isolation_contract: &str) -> String {
    format!(
        "<environment>\nWorking directory: {working_directory}\nIsolation: {isolation_contract}\n</environment>"
    )
}

fn custom_instructions_block(
    global: &InstructionDocument,
    context: &InstructionDocument,
) -> Option<String> {
    let parts: Vec<&str> = [global.stripped_body.as_str(), context.stripped_body.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!(
        "<custom-instructions>\n{}\n</custom-instructions>",
        parts.join("\n\n")
    ))
}

fn mode_block(
    active_mode: &str,
    context: &InstructionDocument,
    global: &InstructionDocument,
) -> Option<String> {
    let section = context
        .mode_sections
        .iter()
        .chain(global.mode_sections.iter())
        .find(|s| s.name.eq_ignore_ascii_case(active_mode))?;
    Some(format!(
        "<mode-{}>\n{}\n</mode-{}>",
        active_mode, section.body, active_mode
    ))
}

fn model_block(
    active_model: &str,
    context: &InstructionDocument,
    global: &InstructionDocument,
) -> Option<String> {
    let section = context
        .model_sections
        .iter()
        .chain(global.model_sections.iter())
        .find(|s| {
            compile_model_pattern(&s.pattern)
                .map(|re| re.is_match(active_model))
                .unwrap_or(false)
        })?;
    Some(format!(
        "<model-{}>\n{}\n</model-{}>",
        active_model, section.body, active_model
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn composes_prelude_and_environment_even_with_no_instructions() {
        let message = build_system_message(SystemMessageInputs {
            working_directory: "/work",
            isolation_contract: "sandboxed",
            global_instructions: None,
            context_instructions: None,
            active_mode: None,
            active_model: "gpt-5",
            additional_instructions: None,
        });
        assert!(message.contains("<environment>"));
        assert!(message.contains("/work"));
        assert!(!message.contains("<custom-instructions>"));
    }

    #[test]
    fn context_mode_section_wins_over_global_with_same_name() {
        let global = "## Mode: review\nglobal review body";
        let context = "## Mode: review\ncontext review body";
        let message = build_system_message(SystemMessageInputs {
            working_directory: "/work",
            isolation_contract: "sandboxed",
            global_instructions: Some(global),
            context_instructions: Some(context),
            active_mode: Some("review"),
            active_model: "gpt-5",
            additional_instructions: None,
        });
        assert!(message.contains("context review body"));
        assert!(!message.contains("global review body"));
    }

    #[test]
    fn model_section_matches_via_regex_pattern() {
        let global = "## Model: gpt-5.*\nuse concise style";
        let message = build_system_message(SystemMessageInputs {
            working_directory: "/work",
            isolation_contract: "sandboxed",
            global_instructions: Some(global),
            context_instructions: None,
            active_mode: None,
            active_model: "gpt-5-high",
            additional_instructions: None,
        });
        assert!(message.contains("use concise style"));
    }

    #[test]
    fn custom_instructions_concatenates_global_then_context_stripped_bodies() {
        let global = "global body\n## Mode: x\nstripped";
        let context = "context body";
        let message = build_system_message(SystemMessageInputs {
            working_directory: "/work",
            isolation_contract: "sandboxed",
            global_instructions: Some(global),
            context_instructions: Some(context),
            active_mode: None,
            active_model: "gpt-5",
            additional_instructions: None,
        });
        assert!(message.contains("global body"));
        assert!(message.contains("context body"));
        assert!(!message.contains("stripped"));
    }

    #[test]
    fn additional_instructions_appended_verbatim() {
        let message = build_system_message(SystemMessageInputs {
            working_directory: "/work",
            isolation_contract: "sandboxed",
            global_instructions: None,
            context_instructions: None,
            active_mode: None,
            active_model: "gpt-5",
            additional_instructions: Some("be extra careful"),
        });
        assert!(message.contains("<additional-instructions>\nbe extra careful"));
    }
}
