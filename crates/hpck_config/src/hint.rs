//! Spelling hints for not-found errors.

use crate::error::ConfigError;

/// Maximum Levenshtein distance at which a hint is suggested.
pub const MAX_HINT_DIST: usize = 3;

/// Closest candidate to `word`, if one is within [`MAX_HINT_DIST`].
///
/// Ties go to the candidate seen first.
pub fn closest<'a, I, S>(word: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    let mut best = None;
    let mut min_dist = MAX_HINT_DIST + 1;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let d = strsim::levenshtein(word, candidate);
        if d < min_dist {
            best = Some(candidate);
            min_dist = d;
        }
    }
    best
}

/// Attach a "did you mean" hint to `err` when `word` is close to a candidate.
pub fn hint_spelling<'a, I, S>(word: &str, candidates: I, err: ConfigError) -> ConfigError
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    match closest(word, candidates) {
        Some(best) => err.with_hint(format!("did you mean {:?}?", best)),
        None => err,
    }
}
