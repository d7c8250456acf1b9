//! Prompt builders for the generation pipelines

use super::capabilities::ChatMessage;
use cpn_common::{Difficulty, Puzzle};

const SELECTION_SYSTEM: &str = "You are a chess puzzle selector. Given a user request and a numbered list of puzzles, pick the best match.\n\
Return ONLY: {\"selected_index\": N}\n\
No extra text.";

/// Selection prompt: user intent plus the candidates by index.
///
/// The candidate order here is the order indices refer to.
pub fn selection_messages(
    prompt: &str,
    tier: Option<Difficulty>,
    candidates: &[Puzzle],
) -> Vec<ChatMessage> {
    let tier = tier.unwrap_or(Difficulty::Medium);
    let listing: String = candidates
        .iter()
        .enumerate()
        .map(|(i, puzzle)| {
            format!(
                "[{}] Rating:{} Themes:{}\n",
                i,
                puzzle.rating,
                puzzle.themes.join(",")
            )
        })
        .collect();
    let user = format!(
        "User wants: {} ({} difficulty)\n\nPuzzles:\n{}",
        prompt.trim(),
        tier,
        listing
    );

    vec![ChatMessage::system(SELECTION_SYSTEM), ChatMessage::user(user)]
}

/// Corrective turn for the selection pipeline
pub fn selection_correction(reason: &str) -> String {
    format!(
        "Your previous output was invalid ({}). Reply with ONLY the JSON object {{\"selected_index\": N}} and nothing else.",
        reason
    )
}

/// System + user prompt for free-form composition
pub fn generation_messages(prompt: &str, tier: Option<Difficulty>) -> Vec<ChatMessage> {
    let tier = tier.unwrap_or(Difficulty::Medium);
    let band = tier.rating_bounds();

    let system = format!(
        "You are a chess puzzle composer. Respond with exactly one JSON object and no other text.\n\
\n\
Schema:\n\
{{\n\
  \"id\": string (optional, short alphanumeric),\n\
  \"fen\": string (FEN with all 6 fields),\n\
  \"moves\": [string] (coordinate notation such as \"e2e4\" or \"e7e8q\"),\n\
  \"rating\": integer,\n\
  \"ratingDeviation\": integer,\n\
  \"themes\": [string],\n\
  \"difficulty\": \"easy\" | \"medium\" | \"hard\"\n\
}}\n\
\n\
Rules:\n\
- The position must be legal and reachable.\n\
- The side to move in the FEN is the side that plays the first solution move.\n\
- moves holds between 2 and 10 moves, alternating sides, each legal in sequence.\n\
- Use coordinate notation only; never SAN like Nf3 or O-O.\n\
- rating must fall between {} and {} ({} difficulty).\n\
- No prose, no markdown, no comments.",
        band.start(),
        band.end(),
        tier
    );

    let user = format!(
        "Create a {} chess puzzle for this request: {}",
        tier,
        prompt.trim()
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Corrective turn for the free-form pipeline
pub fn generation_correction(reason: &str) -> String {
    format!(
        "That puzzle was rejected: {}. Fix it and reply with ONLY the corrected JSON object.",
        reason
    )
}

/// Append the rejected output as an assistant turn followed by `correction`
pub fn with_correction(
    mut messages: Vec<ChatMessage>,
    previous_output: &str,
    correction: String,
) -> Vec<ChatMessage> {
    messages.push(ChatMessage::assistant(previous_output.trim()));
    messages.push(ChatMessage::user(correction));
    messages
}
