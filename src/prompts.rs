//! Prompt templates for the LLM judge, comparator, and anonymizer.
//!
//! Domain logic for rendering collaborator prompts. Provider-agnostic.

use crate::gateway::Message;
use crate::model::Language;

/// Rendered prompt ready for the LLM.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::En => "Write all free-text fields in English.",
        Language::Zh => "Write all free-text fields in Simplified Chinese.",
    }
}

const JUDGE_SYSTEM: &str = "You are a rigorous startup analyst. You evaluate a single startup idea \
on two independent axes: viability (0-100, feasibility of building and launching this) and \
excellence (0-100, long-term market and defensibility potential). You respond with a single JSON \
object and nothing else:\n\
{\"viability\": <0-100>, \"excellence\": <0-100>, \"decision\": \"Go\"|\"Conditional Go\"|\"Drop\", \
\"uncertainty\": \"Low\"|\"Med\"|\"High\", \"top_risks\": [<up to 3 short strings>], \
\"key_enablers\": [<up to 3 short strings>]}";

/// Render the judge prompt for one idea.
pub fn judge_prompt(
    text: &str,
    category: Option<&str>,
    stage: Option<&str>,
    language: Language,
) -> PromptInstance {
    let mut user = String::new();
    user.push_str("<idea>\n");
    user.push_str(&escape_xml_chars(text));
    user.push_str("\n</idea>\n");
    if let Some(category) = category {
        user.push_str(&format!("<category>{}</category>\n", escape_xml_chars(category)));
    }
    if let Some(stage) = stage {
        user.push_str(&format!("<stage>{}</stage>\n", escape_xml_chars(stage)));
    }
    user.push_str(language_instruction(language));

    PromptInstance {
        system: JUDGE_SYSTEM.to_string(),
        user,
    }
}

const COMPARATOR_SYSTEM: &str = "You are a rigorous startup analyst comparing two startup ideas \
head to head. Decide which is the stronger investment overall, considering both feasibility and \
long-term potential. Their prior evaluation summaries are provided as context. You respond with a \
single JSON object and nothing else:\n\
{\"winner\": \"A\"|\"B\"|\"Tie\", \"reasons\": [<up to 3 short strings>], \
\"confidence\": \"Low\"|\"Med\"|\"High\"}";

/// One side of a comparison, with its evaluation context.
#[derive(Debug, Clone)]
pub struct ComparisonSide {
    pub text: String,
    /// Compact restatement of the idea's current evaluation.
    pub evaluation_summary: String,
}

/// Render the comparator prompt for two ideas.
pub fn comparator_prompt(a: &ComparisonSide, b: &ComparisonSide) -> PromptInstance {
    let user = format!(
        "<idea_a>\n{}\n</idea_a>\n<idea_a_evaluation>{}</idea_a_evaluation>\n\
         <idea_b>\n{}\n</idea_b>\n<idea_b_evaluation>{}</idea_b_evaluation>",
        escape_xml_chars(&a.text),
        escape_xml_chars(&a.evaluation_summary),
        escape_xml_chars(&b.text),
        escape_xml_chars(&b.evaluation_summary),
    );

    PromptInstance {
        system: COMPARATOR_SYSTEM.to_string(),
        user,
    }
}

const ANONYMIZER_SYSTEM: &str = "You rewrite a startup idea as a short anonymized summary for a \
public leaderboard. Strip names, company names, locations, and any identifying details; keep the \
core concept. Also assign a broad category (one or two words). You respond with a single JSON \
object and nothing else:\n\
{\"summary\": <string, at most 2 sentences>, \"category\": <string>}";

/// Render the anonymizer prompt for one idea.
pub fn anonymizer_prompt(text: &str, category: Option<&str>, language: Language) -> PromptInstance {
    let mut user = String::new();
    user.push_str("<idea>\n");
    user.push_str(&escape_xml_chars(text));
    user.push_str("\n</idea>\n");
    if let Some(category) = category {
        user.push_str(&format!(
            "<suggested_category>{}</suggested_category>\n",
            escape_xml_chars(category)
        ));
    }
    user.push_str(language_instruction(language));

    PromptInstance {
        system: ANONYMIZER_SYSTEM.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_prompt_escapes_markup_in_idea_text() {
        let p = judge_prompt("an <evil> idea & more", None, None, Language::En);
        assert!(p.user.contains("&lt;evil&gt;"));
        assert!(p.user.contains("&amp; more"));
        assert!(!p.user.contains("<evil>"));
    }

    #[test]
    fn judge_prompt_includes_optional_tags_only_when_present() {
        let bare = judge_prompt("long enough idea text", None, None, Language::En);
        assert!(!bare.user.contains("<category>"));
        let tagged = judge_prompt("long enough idea text", Some("saas"), Some("mvp"), Language::En);
        assert!(tagged.user.contains("<category>saas</category>"));
        assert!(tagged.user.contains("<stage>mvp</stage>"));
    }

    #[test]
    fn comparator_prompt_carries_both_sides() {
        let a = ComparisonSide {
            text: "idea a".into(),
            evaluation_summary: "viability 70".into(),
        };
        let b = ComparisonSide {
            text: "idea b".into(),
            evaluation_summary: "viability 65".into(),
        };
        let p = comparator_prompt(&a, &b);
        assert!(p.user.contains("<idea_a>"));
        assert!(p.user.contains("<idea_b>"));
        assert!(p.user.contains("viability 65"));
    }

    #[test]
    fn language_instruction_switches_with_language() {
        let en = judge_prompt("some idea text here", None, None, Language::En);
        let zh = judge_prompt("some idea text here", None, None, Language::Zh);
        assert!(en.user.contains("English"));
        assert!(zh.user.contains("Chinese"));
    }
}
