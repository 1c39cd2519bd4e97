//! `${VAR}` expansion for config files.
//!
//! Placeholders are expanded in the raw file text before parsing, so
//! `database.url = "sqlite://${HOME}/docscan.db"` works in every format.
//! `${VAR:-fallback}` supplies a value when `VAR` is unset or empty.

/// Result of expanding a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    pub text: String,
    /// Variables that were unset and had no fallback. Their placeholders are
    /// kept verbatim.
    pub unresolved: Vec<String>,
}

/// Expand placeholders from the process environment.
pub fn substitute_env(input: &str) -> Expanded {
    expand(input, |name| std::env::var(name).ok())
}

/// Expand placeholders through `lookup`.
pub fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Expanded {
    let mut text = String::with_capacity(input.len());
    let mut unresolved = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        text.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: the remainder is literal.
            text.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        if !is_var_name(name) {
            text.push_str(&rest[start..start + 2 + end + 1]);
        } else {
            match (lookup(name).filter(|v| !v.is_empty()), fallback) {
                (Some(value), _) => text.push_str(&value),
                (None, Some(fallback)) => text.push_str(fallback),
                (None, None) => {
                    text.push_str(&rest[start..start + 2 + end + 1]);
                    if !unresolved.iter().any(|u| u == name) {
                        unresolved.push(name.to_string());
                    }
                },
            }
        }
        rest = &after[end + 1..];
    }
    text.push_str(rest);

    Expanded { text, unresolved }
}

fn is_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
