/// Ratio-based sequence similarity over case-folded names: `2·M / T`,
/// where `M` is the longest common subsequence length and `T` the sum
/// of both lengths. Identical strings score 1.0, disjoint ones 0.0.
pub fn name_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // LCS length via the usual two-row DP.
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
    }

    let matched = prev[b.len()];
    (2 * matched) as f64 / total as f64
}
