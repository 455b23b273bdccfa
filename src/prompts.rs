//! System prompts for VLM-based text recognition.
//!
//! Callers can override the default via
//! [`crate::config::EnrichConfig::system_prompt`]; the constants here are used
//! only when no override is provided.

/// Default system prompt for reading the text visible in a photo.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Your task is to transcribe every piece of text that is visible in the image.

Follow these rules precisely:

1. WHAT TO TRANSCRIBE
   - Signs, labels, captions, printed and handwritten text, screen content
   - Read in natural reading order: top to bottom, left to right
   - Keep the original spelling, numbers and punctuation

2. WHAT TO IGNORE
   - Do NOT describe the image, people, objects or scenery
   - Do NOT guess text that is unreadable or cut off

3. OUTPUT FORMAT
   - Output ONLY the transcribed text, words separated by spaces
   - Do NOT wrap the output in code fences
   - Do NOT add commentary, labels or explanations
   - If the image contains no readable text, output nothing"#;

/// Build the language hint sent as a second system message.
pub fn language_hint(language: &str) -> String {
    format!(
        "The text in the image is most likely written in the language with ISO 639-1 code \"{}\". Transcribe it in that language without translating.",
        language.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences() {
        assert!(DEFAULT_OCR_PROMPT.contains("code fences"));
    }

    #[test]
    fn language_hint_names_code() {
        let hint = language_hint(" de ");
        assert!(hint.contains("\"de\""));
    }
}
