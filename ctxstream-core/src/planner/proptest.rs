//! Property-based tests for the chunk planner using proptest.
//!
//! These check the partition invariants over arbitrary file sets:
//!
//! - Concatenating a file's chunks reproduces it exactly
//! - Partial chunks cover `1..=total_lines` with no gaps or overlaps
//! - File order is preserved
//! - Whole-file parts stay within the effective budget
