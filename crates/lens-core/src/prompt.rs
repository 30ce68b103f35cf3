//! Prompt template and response extraction
//!
//! The adapter was fine-tuned on exactly this turn layout. Any change in
//! delimiter spelling or whitespace degrades output quality, so the template
//! is a fixed format string and the clause is inserted verbatim.

/// Opens a conversational turn
pub const START_OF_TURN: &str = "<start_of_turn>";

/// Closes a conversational turn
pub const END_OF_TURN: &str = "<end_of_turn>";

/// Instruction line the adapter was tuned on
pub const INSTRUCTION: &str = "Simplify the following legal clause into plain English:";

/// Wrap a clause in the user turn and open the model turn.
pub fn format_prompt(clause: &str) -> String {
    format!(
        "{START_OF_TURN}user\n{INSTRUCTION}\n{clause}\n{END_OF_TURN}\n{START_OF_TURN}model\n"
    )
}

/// Cut decoded model output at the first closing marker and trim it.
///
/// Without a marker the whole text is returned trimmed, which makes the
/// function idempotent: its output never contains [`END_OF_TURN`].
pub fn extract_response(decoded: &str) -> &str {
    match decoded.find(END_OF_TURN) {
        Some(end) => decoded[..end].trim(),
        None => decoded.trim(),
    }
}
