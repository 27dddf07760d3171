/// Integer mean of 0-100 scores, truncated toward zero; 0 for an empty set.
pub fn truncated_mean(scores: &[u8]) -> u8 {
    if scores.is_empty() {
        return 0;
    }
    let total: u32 = scores.iter().map(|s| u32::from(*s)).sum();
    (total / scores.len() as u32) as u8
}
