//! Soft-404 detection.
//!
//! Servers that answer every unknown path with the same page defeat status
//! based filtering. Each host gets a baseline response for a random path and
//! candidate bodies are compared against it by edit distance.

use crate::response::ProbeResponse;

/// Compare a candidate response with its host's baseline.
///
/// Returns whether the candidate is a soft-404 along with the computed
/// similarity. Similarity is `(max(len) - distance) / max(len)` over the bodies,
/// compared case-insensitively. A candidate is a soft-404 only when the
/// similarity is strictly greater than `ratio`. A missing response or an
/// empty body on either side yields `(false, 0.0)`.
pub fn detect_soft_404(
    candidate: Option<&ProbeResponse>,
    baseline: Option<&ProbeResponse>,
    ratio: f64,
) -> (bool, f64) {
    let (Some(candidate), Some(baseline)) = (candidate, baseline) else {
        return (false, 0.0);
    };
    if candidate.body.is_empty() || baseline.body.is_empty() {
        return (false, 0.0);
    }

    let score = similarity(&candidate.body, &baseline.body);
    (score > ratio, score)
}

/// Normalised similarity in `[0, 1]`. Identical inputs score exactly 1.
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    (longest - distance) as f64 / longest as f64
}

/// ASCII case-insensitive Levenshtein distance, kept to two rows sized by the
/// shorter input.
pub fn levenshtein(a: &[u8], b: &[u8]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0usize; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        current[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(!lc.eq_ignore_ascii_case(sc));
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::tests::response_with_body;

    #[test]
    fn test_levenshtein_known_values() {
        assert_eq!(levenshtein(b"kitten", b"sitting"), 3);
        assert_eq!(levenshtein(b"", b"abc"), 3);
        assert_eq!(levenshtein(b"flaw", b"lawn"), 2);
        assert_eq!(levenshtein(b"HeLLo", b"hello"), 0);
    }

    #[test]
    fn test_identical_bodies_are_soft_404() {
        let a = response_with_body(200, "not found, sorry");
        let b = response_with_body(404, "not found, sorry");
        let (soft, score) = detect_soft_404(Some(&a), Some(&b), 0.95);
        assert!(soft);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_dissimilar_bodies_pass() {
        let a = response_with_body(200, "welcome to the admin console");
        let b = response_with_body(404, "nothing here");
        let (soft, score) = detect_soft_404(Some(&a), Some(&b), 0.95);
        assert!(!soft);
        assert!(score < 0.95);
    }

    #[test]
    fn test_ratio_is_strict() {
        // one edit in ten characters scores exactly 0.9
        let a = response_with_body(200, "abcdefghij");
        let b = response_with_body(200, "abcdefghiX");
        let (soft, score) = detect_soft_404(Some(&a), Some(&b), 0.9);
        assert!((score - 0.9).abs() < 1e-9);
        assert!(!soft);
    }

    #[test]
    fn test_ratio_boundary_is_exact() {
        // seven edits in ten: 1 - 0.7 would round above 0.3
        let a = response_with_body(200, "abcdefghij");
        let b = response_with_body(200, "abcXXXXXXX");
        let (soft, score) = detect_soft_404(Some(&a), Some(&b), 0.3);
        assert_eq!(score, 0.3);
        assert!(!soft);
    }

    #[test]
    fn test_missing_or_empty_never_soft_404() {
        let a = response_with_body(200, "body");
        let empty = response_with_body(200, "");
        assert_eq!(detect_soft_404(Some(&a), None, 0.5), (false, 0.0));
        assert_eq!(detect_soft_404(None, Some(&a), 0.5), (false, 0.0));
        assert_eq!(detect_soft_404(Some(&a), Some(&empty), 0.5), (false, 0.0));
    }
}
