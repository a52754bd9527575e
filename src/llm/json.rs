//! JSON extraction from model replies.
//!
//! Models are asked for bare JSON but regularly wrap it in Markdown fences or add
//! a sentence around it, so the outermost object or array is cut out first.

use serde::de::DeserializeOwned;

use super::LlmError;

/// Cut the outermost JSON object or array out of a model reply
///
/// # Examples
///
/// ```rust
/// use recipe_cost::llm::extract_json;
///
/// let reply = "Voici le résultat :\n```json\n{\"categories\": [\"Crèmerie\"]}\n```";
/// assert_eq!(extract_json(reply).unwrap(), "{\"categories\": [\"Crèmerie\"]}");
/// ```
pub fn extract_json(reply: &str) -> Result<&str, LlmError> {
    let start = reply
        .find(|c: char| c == '{' || c == '[')
        .ok_or_else(|| LlmError::Parse(format!("no JSON found in reply: {}", preview(reply))))?;
    let closing = if reply[start..].starts_with('{') { '}' } else { ']' };
    let end = reply
        .rfind(closing)
        .filter(|&end| end > start)
        .ok_or_else(|| LlmError::Parse(format!("unterminated JSON in reply: {}", preview(reply))))?;
    Ok(&reply[start..=end])
}

/// Extract and deserialize the JSON payload of a model reply
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, LlmError> {
    let payload = extract_json(reply)?;
    serde_json::from_str(payload).map_err(|e| LlmError::Parse(format!("{e}: {}", preview(payload))))
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.trim().to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut.trim())
    }
}
