//! Approximate string matching by longest common substring.

/// Default similarity threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Length in characters of the longest common contiguous substring of `a`
/// and `b`, compared case-insensitively.
pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    // Rolling rows over the shorter string.
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    let mut longest = 0;

    for lc in long {
        for (j, sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc { prev[j] + 1 } else { 0 };
            longest = longest.max(curr[j + 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    longest
}

/// Whether `a` and `b` are similar: the longest common substring covers at
/// least `threshold` of the longer string.
pub fn similar(a: &str, b: &str, threshold: f64) -> bool {
    let longer = a.chars().count().max(b.chars().count());
    longest_common_substring(a, b) as f64 >= threshold * longer as f64
}
