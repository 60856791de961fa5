//! Unit tests for glob-based file exclusion

use super::*;

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}





#[cfg(test)]
mod compiled_filter_tests {
    use super::*;

    #[test]
    fn test_precompiled_filter_is_reusable() {
        let filter = FileFilter::new(&patterns(&["**/*.min.js", "coverage/**"]));
        assert!(filter.is_excluded("dist/app.min.js"));
        assert!(filter.is_excluded("coverage/lcov.info"));
        assert!(!filter.is_excluded("src/app.js"));
    }

    #[test]
    fn test_pattern_count_skips_invalid_and_blank() {
        let filter = FileFilter::new(&patterns(&["*.log", "{unclosed", " ", "dist/**"]));
        assert_eq!(filter.pattern_count(), 2);
    }
}
