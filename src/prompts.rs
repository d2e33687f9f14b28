//! Response style: prompt templates, canned replies, and filler prefixes.
//!
//! Everything wording-related lives in one [`ResponseStyle`] loaded from the
//! `[style]` config section, so a terse or verbose persona is a config
//! change rather than another pipeline.
//!
//! Templates use `{name}` placeholders, substituted in a single pass by
//! [`render`]; placeholder-looking text inside substituted values is left
//! alone.

use serde::{Deserialize, Serialize};

use crate::classifier::Script;
use crate::generation::ChatMessage;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseStyle {
    /// System instruction for grounded answers.
    pub system_prompt: String,
    /// User message for grounded answers; `{context}` and `{question}`.
    pub user_template: String,
    /// System instruction for greeting replies.
    pub greeting_system: String,
    /// User message for greeting replies; `{message}`.
    pub greeting_template: String,
    /// Returned for an empty question, without any remote call.
    pub empty_question: String,
    /// Returned when retrieval yields no context, for Latin-script questions.
    pub not_found_latin: String,
    /// Returned when retrieval yields no context, for Arabic-script questions.
    pub not_found_arabic: String,
    /// Leading phrases removed from generated answers, tried in order.
    pub filler_prefixes: Vec<String>,
}

const NOT_FOUND_LATIN: &str = "This information is not in the provided documents.";
const NOT_FOUND_ARABIC: &str = "هذه المعلومة غير واردة في المستندات المعطاة.";

impl Default for ResponseStyle {
    fn default() -> Self {
        Self {
            system_prompt: format!(
                "You answer questions about a fixed set of documents, which may be in Arabic or English.\n\
                 \n\
                 Rules:\n\
                 - Use only information stated in the provided context. Never add general knowledge.\n\
                 - Keep numbers, dates, names, and titles exactly as the context gives them.\n\
                 - For lists, include only items the context states explicitly.\n\
                 - Answer in the language of the question: Arabic for Arabic, English for English.\n\
                 - If the question is vague, answer about the most relevant theme in the context.\n\
                 - If the answer is not in the context, reply exactly:\n\
                 \x20 English: \"{NOT_FOUND_LATIN}\"\n\
                 \x20 Arabic: \"{NOT_FOUND_ARABIC}\"\n\
                 - Plain text only, no markdown. Use line breaks and simple lists when helpful."
            ),
            user_template: "Document context (answer only from this text):\n\
                            ---\n\
                            {context}\n\
                            ---\n\
                            \n\
                            Question: {question}\n\
                            \n\
                            Answer in the same language as the question, using only the context above.\n\
                            \n\
                            Answer:"
                .to_string(),
            greeting_system: "You are a friendly document assistant. Greet the user warmly in \
                              their own language, then point them to the document topics."
                .to_string(),
            greeting_template: "The user sent a greeting or a short conversational message.\n\
                                \n\
                                Message: {message}\n\
                                \n\
                                Reply in the same language (Arabic or English) in two or three \
                                sentences: a friendly greeting, then one sentence inviting a \
                                question about the documents, such as their vision, goals, \
                                strategy, or indicators.\n\
                                \n\
                                Reply:"
                .to_string(),
            empty_question: "Please ask a question about the documents.".to_string(),
            not_found_latin: NOT_FOUND_LATIN.to_string(),
            not_found_arabic: NOT_FOUND_ARABIC.to_string(),
            filler_prefixes: [
                "Based on the documents,",
                "According to the documents,",
                "From the documents,",
                "The documents state that",
                "The documents show that",
                "وفقاً للمستندات،",
                "بناءً على الوثائق،",
                "من الوثائق،",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ResponseStyle {
    /// System + user messages for a grounded answer.
    pub fn grounded_messages(&self, context: &str, question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(render(
                &self.user_template,
                &[("context", context), ("question", question)],
            )),
        ]
    }

    /// System + user messages for a greeting reply.
    pub fn greeting_messages(&self, message: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.greeting_system.clone()),
            ChatMessage::user(render(&self.greeting_template, &[("message", message)])),
        ]
    }

    pub fn not_found(&self, script: Script) -> &str {
        match script {
            Script::Latin => &self.not_found_latin,
            Script::Arabic => &self.not_found_arabic,
        }
    }
}

/// Substitute `{name}` placeholders in one left-to-right pass.
///
/// Unknown placeholders are kept verbatim.
///
/// ```rust
/// use doc_rag::prompts::render;
///
/// let out = render("Q: {question} ({lang})", &[("question", "{context}?")]);
/// assert_eq!(out, "Q: {context}? ({lang})");
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
