// Tokens starting with one of these attach to the previous token
const NO_SPACE_BEFORE: [char; 5] = ['.', '?', ',', ':', ' '];

// A token ending with one of these starts a new sentence
const SENTENCE_END: [char; 5] = ['.', '?', '!', ':', ']'];

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Joins terminal tokens into display text.
///
/// Empty tokens are skipped. Punctuation attaches to the token before it, and
/// the token after a sentence end gets a capital letter. A single character
/// right after a marker such as `[P]` is a propositional atom and keeps its
/// case.
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut text = String::new();
    let mut capitalize_next = false;
    let mut after_marker = false;

    for token in tokens {
        let token: &str = token.as_ref();
        if token.is_empty() {
            continue;
        }

        let atom = after_marker && token.chars().count() == 1;
        let token = if capitalize_next && !atom {
            capitalize(token)
        } else {
            token.to_string()
        };
        capitalize_next = false;
        after_marker = token.ends_with(']');

        if !text.is_empty() && !token.starts_with(NO_SPACE_BEFORE) {
            text.push(' ');
        }
        text.push_str(&token);

        if token.ends_with(SENTENCE_END) {
            capitalize_next = true;
        }
    }

    text
}
