//! Offset-to-block floor mapping.
//!
//! A parsed document's flat text is the concatenation of its text blocks;
//! each block contributes a breakpoint at its starting character offset.
//! Mapping a match offset back to its containing block is a floor search:
//! the greatest breakpoint less than or equal to the offset.

/// Return the greatest breakpoint `<=` target, or `None` when the target
/// lies before every breakpoint.
///
/// Breakpoints need not be supplied sorted. A target beyond the largest
/// breakpoint maps to the largest one: the final block is assumed to
/// extend to the end of the text, so no upper bound is enforced.
///
/// O(n log n) for the sort, O(log n) for the search. Block counts are
/// small, so the floor semantics matter more than the complexity here.
pub fn floor_breakpoint(breakpoints: &[usize], target: i64) -> Option<usize> {
    if breakpoints.is_empty() {
        return None;
    }

    let mut sorted = breakpoints.to_vec();
    sorted.sort_unstable();

    if target < sorted[0] as i64 {
        return None;
    }

    // Number of breakpoints <= target; nonzero after the guard above.
    let idx = sorted.partition_point(|&b| b as i64 <= target);
    Some(sorted[idx - 1])
}
