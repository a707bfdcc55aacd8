//! Parity predicate.

/// Whether `n` is divisible by two. Negative numbers and zero included.
pub fn is_even(n: i64) -> bool {
    n % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_and_zero() {
        assert!(is_even(0));
        assert!(is_even(-2));
        assert!(!is_even(-3));
        assert!(!is_even(i64::MIN + 1));
        assert!(is_even(i64::MIN));
    }
}
