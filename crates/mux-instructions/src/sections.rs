//! Scoped-section parsing: `Mode: <name>` / `Model: <pattern>` headings,
//! extracted from a markdown-ish instruction document and stripped from the
//! body that feeds `<custom-instructions>`.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s*(.+?)\s*$").unwrap());
static MODE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^mode\s*:\s*(.+)$").unwrap());
static MODEL_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^model\s*:\s*(.+)$").unwrap());
static SLASH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(.*)/([a-zA-Z]*)$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ModeSection {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSection {
    pub pattern: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstructionDocument {
    pub stripped_body: String,
    pub mode_sections: Vec<ModeSection>,
    pub model_sections: Vec<ModelSection>,
}

enum Scope {
    Mode(String),
    Model(String),
}

pub fn parse(text: &str) -> InstructionDocument {
    let text = HTML_COMMENT.replace_all(text, "");

    let mut stripped_lines: Vec<&str> = Vec::new();
    let mut mode_sections: Vec<ModeSection> = Vec::new();
    let mut model_sections: Vec<ModelSection> = Vec::new();

    let mut active: Option<(Scope, usize, Vec<&str>)> = None;

    let close = |active: Option<(Scope, usize, Vec<&str>)>,
                 mode_sections: &mut Vec<ModeSection>,
                 model_sections: &mut Vec<ModelSection>| {
        if let Some((scope, _level, lines)) = active {
            let body = lines.join("\n").trim().to_string();
            match scope {
                Scope::Mode(name) => mode_sections.push(ModeSection { name, body }),
                Scope::Model(pattern) => model_sections.push(ModelSection { pattern, body }),
            }
        }
    };

    for line in text.lines() {
        if let Some(caps) = HEADING.captures(line) {
            let level = caps[1].len();
            let heading_text = caps[2].trim();

            if let Some((_, active_level, _)) = &active {
                if level <= *active_level {
                    let finished = active.take();
                    close(finished, &mut mode_sections, &mut model_sections);
                }
            }

            if let Some(m) = MODE_HEADING.captures(heading_text) {
                active = Some((Scope::Mode(m[1].trim().to_string()), level, Vec::new()));
                continue;
            }
            if let Some(m) = MODEL_HEADING.captures(heading_text) {
                active = Some((Scope::Model(m[1].trim().to_string()), level, Vec::new()));
                continue;
            }

            if active.is_none() {
                stripped_lines.push(line);
            } else if let Some((_, _, lines)) = &mut active {
                lines.push(line);
            }
            continue;
        }

        match &mut active {
            Some((_, _, lines)) => lines.push(line),
            None => stripped_lines.push(line),
        }
    }
    close(active, &mut mode_sections, &mut model_sections);

    InstructionDocument {
        stripped_body: stripped_lines.join("\n").trim().to_string(),
        mode_sections,
        model_sections,
    }
}

/// Compiles a `Model:` pattern, supporting `/pattern/flags` syntax. Returns
/// `None` on an invalid regex rather than propagating an error, per the
/// "invalid regexes ignored" rule.
pub fn compile_model_pattern(raw: &str) -> Option<Regex> {
    if let Some(caps) = SLASH_PATTERN.captures(raw) {
        let pattern = &caps[1];
        let flags = &caps[2];
        let case_insensitive = flags.contains('i');
        return regex::RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .ok();
    }
    Regex::new(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_html_comments() {
        let doc = parse("before <!-- hidden\nacross lines --> after");
        assert_eq!(doc.stripped_body, "before  after");
    }

    #[test]
    fn extracts_a_mode_section_and_strips_it_from_body() {
        let text = "intro\n## Mode: review\nbe thorough\n## next heading\nmore body";
        let doc = parse(text);
        assert_eq!(doc.mode_sections.len(), 1);
        assert_eq!(doc.mode_sections[0].name, "review");
        assert_eq!(doc.mode_sections[0].body, "be thorough");
        assert!(!doc.stripped_body.contains("be thorough"));
        assert!(doc.stripped_body.contains("intro"));
        assert!(doc.stripped_body.contains("more body"));
    }

    #[test]
    fn section_extends_to_next_heading_of_same_or_higher_level() {
        let text = "# Mode: plan\nbody line 1\n### sub heading ignored as scope but kept\nbody line 2\n# Mode: act\nother body";
        let doc = parse(text);
        assert_eq!(doc.mode_sections.len(), 2);
        assert!(doc.mode_sections[0].body.contains("body line 1"));
        assert!(doc.mode_sections[0].body.contains("sub heading"));
        assert!(doc.mode_sections[0].body.contains("body line 2"));
        assert_eq!(doc.mode_sections[1].name, "act");
        assert_eq!(doc.mode_sections[1].body, "other body");
    }

    #[test]
    fn model_section_pattern_is_case_insensitive_keyword() {
        let text = "## MODEL: gpt-.*\nuse terse style";
        let doc = parse(text);
        assert_eq!(doc.model_sections.len(), 1);
        assert_eq!(doc.model_sections[0].pattern, "gpt-.*");
    }

    #[test]
    fn compiles_slash_pattern_with_case_insensitive_flag() {
        let re = compile_model_pattern("/gpt-4.*/i").unwrap();
        assert!(re.is_match("GPT-4-Turbo"));
    }

    #[test]
    fn invalid_regex_is_ignored_not_an_error() {
        assert!(compile_model_pattern("(unclosed").is_none());
    }
}
