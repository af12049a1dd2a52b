use serde::Serialize;

/// Similarity ratio a candidate must reach before it is applied silently.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Looser ratio used only to decorate failures with a "did you mean" hint.
pub const SUGGEST_THRESHOLD: f64 = 0.4;

/// Records that a requested name was applied as a different column name.
/// Exact matches never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub requested: String,
    pub resolved: String,
}

/// Outcome of resolving a list of names: matches and corrections preserve
/// request order, as does the list of names nothing matched.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub matched: Vec<String>,
    pub corrections: Vec<Correction>,
    pub not_found: Vec<String>,
}

/// Map a requested name onto an actual column name.
///
/// Cascade, first hit wins: case-insensitive equality, then the best
/// normalized-edit-distance ratio over the raw names, the lower-cased
/// names, and finally the names with everything non-alphanumeric
/// stripped. A ratio below `threshold` at every stage resolves to
/// nothing. Ties go to the earliest column in dataset order.
pub fn resolve_column(requested: &str, available: &[String], threshold: f64) -> Option<String> {
    let requested = requested.trim();
    if requested.is_empty() || available.is_empty() {
        return None;
    }

    let requested_lower = requested.to_lowercase();
    if let Some(hit) = available.iter().find(|c| c.to_lowercase() == requested_lower) {
        return Some(hit.clone());
    }

    if let Some(hit) = best_match(requested, available, threshold, |s| s.to_string()) {
        return Some(hit);
    }
    if let Some(hit) = best_match(requested, available, threshold, |s| s.to_lowercase()) {
        return Some(hit);
    }
    best_match(requested, available, threshold, normalize)
}

/// Resolve several names element-wise, preserving request order.
pub fn resolve_columns(requested: &[String], available: &[String], threshold: f64) -> Resolution {
    let mut resolution = Resolution::default();
    for name in requested {
        match resolve_column(name, available, threshold) {
            Some(resolved) => {
                if resolved != *name {
                    resolution.corrections.push(Correction {
                        requested: name.clone(),
                        resolved: resolved.clone(),
                    });
                }
                resolution.matched.push(resolved);
            }
            None => resolution.not_found.push(name.clone()),
        }
    }
    resolution
}

/// The hint attached to a failed resolution, if any name comes close.
pub fn suggestion_for(requested: &str, available: &[String]) -> Option<String> {
    resolve_column(requested, available, SUGGEST_THRESHOLD)
}

fn best_match<F>(
    requested: &str,
    available: &[String],
    threshold: f64,
    key: F,
) -> Option<String>
where
    F: Fn(&str) -> String,
{
    let needle = key(requested);
    let mut best: Option<(f64, &String)> = None;
    for candidate in available {
        let score = strsim::normalized_levenshtein(&needle, &key(candidate));
        // Strictly greater keeps the earliest candidate on ties.
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }
    best.and_then(|(score, name)| (score >= threshold).then(|| name.clone()))
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
