//! Constant-time webhook token comparison.

/// Compares a presented token against the expected secret without an early
/// exit. Both sides are walked to the longer length with zero padding, and a
/// length mismatch taints the accumulator, so the comparison cost does not
/// depend on where the first differing byte sits.
pub fn constant_time_token_eq(token: &str, expected: &str) -> bool {
    let a = token.as_bytes();
    let b = expected.as_bytes();
    let len = a.len().max(b.len());

    let mut diff: usize = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= (x ^ y) as usize;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(constant_time_token_eq("hunter2", "hunter2"));
        assert!(constant_time_token_eq("", ""));
    }

    #[test]
    fn differing_tokens_fail_wherever_they_diverge() {
        assert!(!constant_time_token_eq("Xunter2", "hunter2"));
        assert!(!constant_time_token_eq("hunteR2", "hunter2"));
        assert!(!constant_time_token_eq("hunter3", "hunter2"));
    }

    #[test]
    fn length_mismatches_fail() {
        assert!(!constant_time_token_eq("hunter", "hunter2"));
        assert!(!constant_time_token_eq("hunter22", "hunter2"));
        // A prefix relationship must not pass either way.
        assert!(!constant_time_token_eq("", "hunter2"));
        assert!(!constant_time_token_eq("hunter2", ""));
    }
}
