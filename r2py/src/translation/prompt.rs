//! Prompt construction and completion post-processing.

use super::TranslationOutcome;

/// What the model is told to answer when the input is not R.
pub const REJECTION_MESSAGE: &str = "Error: The provided input is not valid R code.";

/// Any completion starting with this (after trimming) is a rejection.
pub const REJECTION_PREFIX: &str = "Error:";

/// Build the instruction prompt with `source` embedded verbatim.
pub fn build_prompt(source: &str) -> String {
    format!(
        "You are an expert programmer fluent in both R and Python. Follow these steps:

1. Decide whether the input below is valid R code.
2. If it is valid R, or has only minor syntax errors that can be fixed mechanically, translate it into equivalent Python 3 code.
3. The Python code must be free of indentation and syntax errors, with every library it needs imported at the top.
4. If the input is not R (for example Python, Java, JavaScript or any other language), or cannot be parsed as code at all, answer exactly:
\"{REJECTION_MESSAGE}\"

Rules:
- Only translate input that is valid R or has easily fixable syntax errors.
- Never translate code written in another language or gibberish; answer with \"{REJECTION_MESSAGE}\" instead.
- Answer with the Python code or the error message only, without explanations, comments or any other text.

Input:
{source}
"
    )
}

/// Classify the raw completion text.
pub fn classify_completion(text: &str) -> TranslationOutcome {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return TranslationOutcome::failed("the completion service returned an empty response");
    }
    if trimmed.starts_with(REJECTION_PREFIX) {
        return TranslationOutcome::Rejected(trimmed.to_string());
    }

    let dedented = dedent(text);
    TranslationOutcome::Success(dedented.trim_matches('\n').trim_end().to_string())
}

/// Remove the common leading whitespace from every line of `text`.
///
/// Whitespace-only lines do not take part in computing the margin and come out empty.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(common_prefix)
        .unwrap_or("");

    text.lines()
        .map(|line| if line.trim().is_empty() { "" } else { &line[margin.len()..] })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..len]
}
