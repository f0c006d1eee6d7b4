//! Variable-length output without runtime allocation on the caller's behalf.
//!
//! An empty output slice asks only for the number of available elements. A
//! non-empty slice receives up to `output.len()` elements and the call reports
//! how many were written; a short slice is a partial read, not an error.

pub fn fill<T: Clone>(items: &[T], output: &mut [T]) -> usize {
    if output.is_empty() {
        return items.len();
    }
    let written = items.len().min(output.len());
    output[..written].clone_from_slice(&items[..written]);
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_reports_count() {
        assert_eq!(fill(&[1, 2, 3], &mut []), 3);
    }

    #[test]
    fn short_output_is_partial_read() {
        let mut out = [0; 2];
        assert_eq!(fill(&[7, 8, 9], &mut out), 2);
        assert_eq!(out, [7, 8]);
    }

    #[test]
    fn long_output_leaves_tail_untouched() {
        let mut out = [0; 4];
        assert_eq!(fill(&[5, 6], &mut out), 2);
        assert_eq!(out, [5, 6, 0, 0]);
    }
}
