use chrono::{DateTime, Utc};

const MAX_PREFIX_LEN: usize = 80;

/// `{prefix}_{YYYYmmdd_HHMMSS}.{extension}`, with the prefix made filesystem safe.
pub fn export_filename(prefix: &str, stamp: Option<DateTime<Utc>>, extension: &str) -> String {
    let prefix = sanitize_prefix(prefix);
    match stamp {
        Some(stamp) => format!("{prefix}_{}.{extension}", stamp.format("%Y%m%d_%H%M%S")),
        None => format!("{prefix}.{extension}"),
    }
}

fn sanitize_prefix(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.trim().chars() {
        let c = if c.is_alphanumeric() || c == '-' || c == '.' {
            c
        } else {
            '_'
        };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    let mut cleaned = compacted.trim_matches(&['_', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "export".to_string();
    }
    if let Some((index, _)) = cleaned.char_indices().nth(MAX_PREFIX_LEN) {
        cleaned.truncate(index);
    }
    cleaned
}
