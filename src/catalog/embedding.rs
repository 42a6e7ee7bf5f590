const EMBEDDING_DIM: usize = 64;

/// Hashed bag-of-words embedding, L2-normalized. `None` when the text has no tokens.
pub fn embed_text(text: &str) -> Option<Vec<f32>> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    let mut out = vec![0.0_f32; EMBEDDING_DIM];
    for token in tokens {
        let hash = stable_hash(token.as_bytes());
        let idx = (hash as usize) % EMBEDDING_DIM;
        let sign = if hash & 1 == 0 { 1.0_f32 } else { -1.0_f32 };
        let mag = 1.0_f32 + (token.len() as f32 / 32.0_f32);
        out[idx] += sign * mag;
    }

    let norm = l2_norm(&out);
    if norm <= f32::EPSILON {
        return None;
    }
    for value in &mut out {
        *value /= norm;
    }
    Some(out)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let a_norm = l2_norm(a);
    let b_norm = l2_norm(b);
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    dot / (a_norm * b_norm)
}

// Identifiers like `works_list` or `rev-org` also contribute their parts.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '-')) {
        let token = raw.trim_matches(is_separator).to_lowercase();
        if token.is_empty() {
            continue;
        }
        if token.contains(is_separator) {
            tokens.extend(
                token
                    .split(is_separator)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            );
        }
        tokens.push(token);
    }
    tokens
}

fn is_separator(ch: char) -> bool {
    ch == '_' || ch == '-'
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

fn stable_hash(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325_u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3_u64);
    }
    hash
}
