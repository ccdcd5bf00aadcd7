//! crates/study_cards_core/src/prompt.rs
//!
//! Prompt construction for every model request the application makes.

use crate::domain::Highlight;

const FORMAT_RULES: &str = r#"CRITICAL INSTRUCTION: You MUST respond with ONLY a valid JSON array of objects. No prose, explanations, or labels before or after the JSON.

Format requirements:
1. Response MUST be a single valid JSON array of objects
2. Each object MUST have exactly two fields: "front" and "back"
3. Each "front" field contains a question
4. Each "back" field contains the answer
5. DO NOT include any markdown formatting (no ```json, no ``` at start or end)
6. DO NOT include any explanation text before or after the JSON
7. JSON should start with [ and end with ]"#;

const FORMAT_EXAMPLE: &str = r#"Example of EXACTLY how your response should be formatted:
[{"front":"What is photosynthesis?","back":"The process by which plants convert light energy into chemical energy"},{"front":"Who wrote Hamlet?","back":"William Shakespeare"}]"#;

const GUIDELINES: &str = r#"• Each card must focus on ONE specific concept (atomic knowledge)
• Questions should be precise and unambiguous about what they're asking
• Answers must be EXTREMELY concise - 1-2 sentences maximum (10-25 words)
• Focus on core concepts, relationships, and techniques rather than trivia
• Avoid yes/no questions or questions with binary answers
• When referencing authors, use specific names instead of "the author"
• Questions should require genuine recall, not just recognition
• Do not provide any HTML syntax

Consider these knowledge types:
• For facts: Break complex facts into atomic units
• For concepts: Address attributes, similarities/differences, and significance
• For procedures: Focus on decision points and critical parameters"#;

const CLOSING_REMINDER: &str = r#"REMEMBER: Your entire response MUST be ONLY a valid JSON array of objects with "front" and "back" fields, nothing else."#;

const CLEANUP_INSTRUCTION: &str = "Extract and clean the content from this webpage text. Keep the important information including title, main body, and key points. Remove navigation elements, ads, footers, and other non-essential content:";

const SUMMARY_INSTRUCTION: &str =
    "Summarize this with more detail for a university student level:";

/// Builds the single instruction prompt for flashcard generation.
///
/// The user's preference, when present, is placed ahead of the default guidelines and
/// marked as taking priority over them. The source text always comes last.
pub fn flashcard_prompt(source_text: &str, preference: Option<&str>, max_cards: Option<usize>) -> String {
    let limit_rule = match max_cards {
        Some(n) => format!("8. Create AT MOST {} flashcards", n),
        None => "8. Create as many flashcards as the material warrants".to_string(),
    };

    let mut prompt = String::with_capacity(source_text.len() + 3000);
    prompt.push_str(FORMAT_RULES);
    prompt.push('\n');
    prompt.push_str(&limit_rule);
    prompt.push_str("\n\n");
    prompt.push_str(FORMAT_EXAMPLE);
    prompt.push_str("\n\n");

    if let Some(pref) = preference.map(str::trim).filter(|p| !p.is_empty()) {
        prompt.push_str("This is primary (the user's preferences override everything below):\n");
        prompt.push_str(pref);
        prompt.push_str("\n\nWhat comes next is secondary:\n");
    }
    prompt.push_str(GUIDELINES);
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING_REMINDER);
    prompt.push_str("\n\nArticle:\n\n");
    prompt.push_str(source_text);
    prompt
}

/// Builds the source text for generating one card per saved highlight, with the full
/// article as optional context.
pub fn highlights_source(highlights: &[Highlight], page_label: &str, article: Option<&str>) -> String {
    let passages = highlights
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    let article = article
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("No article context available");

    format!(
        "For this task, I'm providing you with HIGHLIGHTED TEXT passages from {page_label}.\n\
         Generate one high-quality flashcard focusing SPECIFICALLY on each of the highlighted passages.\n\
         Use the full article for context to create better cards.\n\n\
         HIGHLIGHTED PASSAGES (create cards for these specifically):\n{passages}\n\n\
         FULL ARTICLE (for context):\n{article}\n"
    )
}

pub fn cleanup_prompt(text: &str) -> String {
    format!("{}\n\n{}", CLEANUP_INSTRUCTION, text)
}

pub fn summary_prompt(text: &str) -> String {
    format!("{}\n\n{}", SUMMARY_INSTRUCTION, text)
}
