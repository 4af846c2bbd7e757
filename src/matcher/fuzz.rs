//! String similarity metrics on a 0–100 scale.
//!
//! All metrics work on Unicode scalar values, so Cyrillic and Latin text
//! score the same way.

use similar::{Algorithm, DiffOp, capture_diff_slices};
use std::collections::BTreeSet;

/// Similarity of two char sequences: `2·M / (|a| + |b|)` where `M` is the
/// length of their longest common subsequence.
fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched: usize = capture_diff_slices(Algorithm::Myers, a, b)
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();
    200.0 * matched as f64 / total as f64
}

/// Plain edit-based similarity. Empty input scores 0.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best [`ratio`] of the shorter string against any equally long window of
/// the longer one, including windows clipped at either edge.
///
/// Tolerates truncated or embedded phrases: `"привет"` scores 100 against
/// `"привет как дела"`.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let n = short.len();
    let mut best: f64 = 0.0;
    let mut consider = |window: &[char]| {
        let score = ratio_chars(&short, window);
        if score > best {
            best = score;
        }
        best >= 100.0
    };

    for start in 0..=(long.len() - n) {
        if consider(&long[start..start + n]) {
            return 100.0;
        }
    }
    for len in 1..n {
        if consider(&long[..len]) || consider(&long[long.len() - len..]) {
            return 100.0;
        }
    }
    best
}

/// Set-based similarity: insensitive to word order, duplicates, and to one
/// side carrying extra words the other lacks.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let join_with_sect = |rest: &[&str]| {
        if sect.is_empty() {
            rest.join(" ")
        } else {
            format!("{sect} {}", rest.join(" "))
        }
    };
    let combined_a = join_with_sect(&only_a);
    let combined_b = join_with_sect(&only_b);

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_a))
            .max(ratio(&sect, &combined_b));
    }
    best
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ratio_basics() {
        assert!(approx(ratio("привет", "привет"), 100.0));
        assert!(approx(ratio("abcd", "abce"), 75.0));
        assert!(approx(ratio("abc", "xyz"), 0.0));
        assert!(approx(ratio("", "abc"), 0.0));
        assert!(approx(ratio("", ""), 0.0));
    }

    #[test]
    fn ratio_is_symmetric() {
        let pairs = [("открой браузер", "открыть браузер"), ("kitten", "sitting")];
        for (a, b) in pairs {
            assert!(approx(ratio(a, b), ratio(b, a)));
        }
    }

    #[test]
    fn token_set_ignores_order_and_extra_words() {
        assert!(approx(token_set_ratio("открой браузер", "браузер открой"), 100.0));
        assert!(approx(token_set_ratio("открой браузер быстро", "открой браузер"), 100.0));
        assert!(approx(token_set_ratio("play play music", "music play"), 100.0));
    }

    #[test]
    fn token_set_partial_overlap_scores_between() {
        let score = token_set_ratio("включи музыку", "включи свет");
        assert!(score > 0.0 && score < 100.0, "score = {score}");
        assert!(approx(token_set_ratio("a b", "c d"), ratio("a b", "c d")));
    }

    #[test]
    fn partial_finds_embedded_phrase() {
        assert!(approx(partial_ratio("привет", "привет как дела"), 100.0));
        assert!(approx(partial_ratio("как дела у тебя", "дела"), 100.0));
        assert!(partial_ratio("погода", "погоду") > 80.0);
    }

    #[test]
    fn partial_handles_edge_windows() {
        // Full-length windows top out at 50; the clipped "cd" prefix scores higher.
        let score = partial_ratio("abcd", "cdxxxxxx");
        assert!(score > 60.0, "score = {score}");
        assert!(approx(partial_ratio("", "abc"), 0.0));
    }

    #[test]
    fn partial_never_below_plain_ratio_for_equal_lengths() {
        let (a, b) = ("время", "бремя");
        assert!(partial_ratio(a, b) >= ratio(a, b));
    }
}
