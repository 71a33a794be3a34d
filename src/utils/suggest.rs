fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }
    let m = b.chars().count();
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.copy_from_slice(&curr);
    }
    prev[m]
}

fn allowed_distance(input: &str) -> usize {
    match input.len() {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        n => ((n as f32 * 0.35).floor() as usize).max(3),
    }
}

/// Closest candidates to `input`, for did-you-mean hints on unknown actions
/// and field names.
pub fn suggest(input: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = normalize(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let cutoff = allowed_distance(&needle);
    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .filter_map(|candidate| {
            let other = normalize(candidate);
            if other.is_empty() {
                return None;
            }
            let score = if needle == other {
                0
            } else if needle.contains(&other) || other.contains(&needle) {
                1
            } else {
                levenshtein(&needle, &other)
            };
            (score <= cutoff).then_some((score, candidate))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });
    let mut out: Vec<String> = Vec::new();
    for (_, candidate) in scored {
        if !out.contains(candidate) {
            out.push(candidate.clone());
        }
        if out.len() >= limit.max(1) {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::suggest;

    #[test]
    fn suggest_finds_close_action_names() {
        let candidates = vec![
            "create_cbo".to_string(),
            "create_abo".to_string(),
            "update_budget".to_string(),
        ];
        let out = suggest("create_cob", &candidates, 2);
        assert_eq!(out.first().map(String::as_str), Some("create_cbo"));
    }

    #[test]
    fn suggest_returns_empty_for_distant_input() {
        let candidates = vec!["get".to_string(), "list_by_account".to_string()];
        assert!(suggest("zzzzzzzzzz", &candidates, 3).is_empty());
    }
}
