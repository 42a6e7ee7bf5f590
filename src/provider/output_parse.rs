/// Returns the outermost `{ ... }` span of a model reply, skipping code fences and any prose
/// around the object.
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// True when a reply declares that nothing fits: `None`, `"None"`, `null`, with or without
/// code fences and punctuation.
pub fn is_none_reply(reply: &str) -> bool {
    let cleaned = strip_code_fences(reply)
        .trim()
        .trim_matches(|ch: char| ch == '"' || ch == '\'' || ch == '.' || ch.is_whitespace());
    cleaned.eq_ignore_ascii_case("none") || cleaned.eq_ignore_ascii_case("null")
}

pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
