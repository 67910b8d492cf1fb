//! Subsequence matching over enumerated files, used by quick-open.

use crate::tree::FileRecord;

/// Files whose path contains `query` as a case-insensitive subsequence,
/// best matches first. Ranking prefers the tightest matched span, then the
/// shorter path. An empty query returns every file in its original order.
pub fn fuzzy_filter<'a>(files: &'a [FileRecord], query: &str) -> Vec<&'a FileRecord> {
    let needle: Vec<char> = query
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if needle.is_empty() {
        return files.iter().collect();
    }
    let mut ranked: Vec<(usize, &FileRecord)> = files
        .iter()
        .filter_map(|file| match_span(&file.path, &needle).map(|span| (span, file)))
        .collect();
    ranked.sort_by(|(span_a, a), (span_b, b)| {
        span_a
            .cmp(span_b)
            .then_with(|| a.path.len().cmp(&b.path.len()))
            .then_with(|| a.path.cmp(&b.path))
    });
    ranked.into_iter().map(|(_, file)| file).collect()
}

/// Length of the shortest window of `haystack` containing `needle` in order.
fn match_span(haystack: &str, needle: &[char]) -> Option<usize> {
    let hay: Vec<char> = haystack.chars().flat_map(char::to_lowercase).collect();
    let first = *needle.first()?;
    let mut best: Option<usize> = None;
    for start in (0..hay.len()).filter(|&idx| hay[idx] == first) {
        let mut cursor = start + 1;
        let mut matched = true;
        for &ch in &needle[1..] {
            match hay[cursor..].iter().position(|&candidate| candidate == ch) {
                Some(offset) => cursor += offset + 1,
                None => {
                    matched = false;
                    break;
                }
            }
        }
        if !matched {
            // Later starts cannot succeed if this one ran out of input.
            break;
        }
        let span = cursor - start;
        best = Some(best.map_or(span, |current| current.min(span)));
    }
    best
}
