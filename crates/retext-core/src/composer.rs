//! System prompt assembly from selected transformations.

use crate::transforms::UserContext;

/// Framing line used when more than one transformation is applied.
pub const MULTI_EDIT_PREAMBLE: &str = "Please apply the following list of edits to the text:";

/// Separator between individual edit prompts.
pub const EDIT_SEPARATOR: &str = "\n\n---\n\n";

/// Heading for the user details block.
pub const USER_DETAILS_HEADING: &str = "User details (customize using these if necessary):";

/// Builds the system prompt for one pipeline run.
///
/// A single prompt is used verbatim. Several prompts are framed as a list of
/// edits, in the given order. Non-empty `user_context` is appended as
/// `label: value` lines.
///
/// Callers must pass at least one prompt.
pub fn compose<S: AsRef<str>>(prompts: &[S], user_context: Option<&UserContext>) -> String {
    debug_assert!(!prompts.is_empty(), "compose requires at least one prompt");

    let mut parts: Vec<String> = Vec::with_capacity(3);

    if let [single] = prompts {
        parts.push(single.as_ref().to_string());
    } else {
        parts.push(MULTI_EDIT_PREAMBLE.to_string());
        let joined = prompts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(EDIT_SEPARATOR);
        parts.push(joined);
    }

    if let Some(context) = user_context.filter(|c| !c.is_empty()) {
        let details = context
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("\n{USER_DETAILS_HEADING}\n{details}"));
    }

    parts.join("\n\n")
}
