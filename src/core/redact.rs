//! Scrub credentials out of text before it reaches a terminal or a log.

use regex::Regex;
use std::sync::LazyLock;

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)bearer\s+[a-zA-Z0-9_\-\.=+/]{8,}").unwrap(),
            "Bearer [REDACTED]",
        ),
        (
            Regex::new(r#"(?i)(access_token|refresh_token|id_token)['"]?\s*[:=]\s*['"]?[^\s'",&]{8,}['"]?"#)
                .unwrap(),
            "$1=[REDACTED]",
        ),
        // JWT-shaped strings, which is what EBRAINS IAM hands out
        (
            Regex::new(r"eyJ[a-zA-Z0-9_\-]{8,}\.[a-zA-Z0-9_\-]{8,}\.[a-zA-Z0-9_\-]+").unwrap(),
            "[JWT_REDACTED]",
        ),
    ]
});

pub fn redact_string(input: &str) -> String {
    let mut result = input.to_string();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Redact generic patterns plus one known secret verbatim.
pub fn redact_known(input: &str, secret: &str) -> String {
    let secret = secret.trim();
    let scrubbed = if secret.len() >= 4 {
        input.replace(secret, "[REDACTED]")
    } else {
        input.to_string()
    };
    redact_string(&scrubbed)
}
