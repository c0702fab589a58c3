//! Tests for overlap estimation and merge planning
//!
//! These tests verify:
//! - Sweep-line maximum over weighted inclusive intervals
//! - Touching intervals count as overlapping
//! - Group-level approximation and merge planning helpers

use globalsort::overlap::{needs_merge_sort, split_data_files};
use globalsort::{get_max_overlapping, get_max_overlapping_total, Endpoint, MergeSortConfig, MultipleFilesStat};

// =============================================================================
// Helper Functions
// =============================================================================

fn intervals(ranges: &[(&[u8], &[u8])]) -> Vec<Endpoint> {
    let mut points = Vec::new();
    for (start, end) in ranges {
        points.push(Endpoint::start(start.to_vec(), 1));
        points.push(Endpoint::end(end.to_vec(), 1));
    }
    points
}

fn stat(min: &[u8], max: &[u8], files: usize, overlap: i64) -> MultipleFilesStat {
    MultipleFilesStat {
        min_key: min.to_vec(),
        max_key: max.to_vec(),
        filenames: (0..files)
            .map(|i| (format!("data/{}", i), format!("data_stat/{}", i)))
            .collect(),
        max_overlapping_num: overlap,
    }
}

// =============================================================================
// Sweep Line Tests
// =============================================================================

#[test]
fn test_empty_input() {
    assert_eq!(get_max_overlapping(Vec::new()), 0);
}

#[test]
fn test_single_interval() {
    assert_eq!(get_max_overlapping(intervals(&[(b"a", b"z")])), 1);
}

#[test]
fn test_chained_intervals() {
    let points = intervals(&[(b"\x01", b"\x05"), (b"\x03", b"\x08"), (b"\x06", b"\x0a")]);
    assert_eq!(get_max_overlapping(points), 2);
}

#[test]
fn test_disjoint_intervals() {
    let points = intervals(&[(b"a", b"b"), (b"c", b"d"), (b"e", b"f")]);
    assert_eq!(get_max_overlapping(points), 1);
}

#[test]
fn test_touching_intervals_overlap() {
    let points = intervals(&[(b"a", b"c"), (b"c", b"e")]);
    assert_eq!(get_max_overlapping(points), 2);
}

#[test]
fn test_single_key_intervals_at_same_key() {
    let points = intervals(&[(b"k", b"k"), (b"k", b"k"), (b"k", b"k")]);
    assert_eq!(get_max_overlapping(points), 3);
}

#[test]
fn test_nested_intervals() {
    let points = intervals(&[(b"a", b"z"), (b"b", b"y"), (b"c", b"d"), (b"x", b"y")]);
    assert_eq!(get_max_overlapping(points), 3);
}

#[test]
fn test_input_order_does_not_matter() {
    let mut points = intervals(&[(b"\x01", b"\x05"), (b"\x03", b"\x08"), (b"\x06", b"\x0a")]);
    points.reverse();
    assert_eq!(get_max_overlapping(points), 2);
}

#[test]
fn test_weighted_intervals() {
    let points = vec![
        Endpoint::start(b"a".to_vec(), 3),
        Endpoint::end(b"m".to_vec(), 3),
        Endpoint::start(b"k".to_vec(), 4),
        Endpoint::end(b"z".to_vec(), 4),
    ];
    assert_eq!(get_max_overlapping(points), 7);
}

// =============================================================================
// Group Statistics Tests
// =============================================================================

#[test]
fn test_build_group_stat() {
    let mut group = MultipleFilesStat::default();
    let starts = vec![b"c".to_vec(), b"a".to_vec(), b"m".to_vec()];
    let ends = vec![b"f".to_vec(), b"d".to_vec(), b"q".to_vec()];

    group.build(&starts, &ends);

    assert_eq!(group.min_key, b"a");
    assert_eq!(group.max_key, b"q");
    assert_eq!(group.max_overlapping_num, 2);
}

#[test]
fn test_build_group_stat_empty_is_noop() {
    let mut group = MultipleFilesStat::default();
    group.build(&[], &[]);
    assert_eq!(group, MultipleFilesStat::default());
}

#[test]
fn test_total_overlap_stacks_group_weights() {
    let stats = vec![stat(b"a", b"m", 10, 4), stat(b"k", b"z", 10, 5)];
    assert_eq!(get_max_overlapping_total(&stats), 9);
}

#[test]
fn test_total_overlap_disjoint_groups() {
    let stats = vec![stat(b"a", b"c", 10, 4), stat(b"d", b"z", 10, 5)];
    assert_eq!(get_max_overlapping_total(&stats), 5);
}

#[test]
fn test_total_overlap_no_groups() {
    assert_eq!(get_max_overlapping_total(&[]), 0);
}

// =============================================================================
// Merge Planning Tests
// =============================================================================

#[test]
fn test_needs_merge_sort_threshold_is_exclusive() {
    let cfg = MergeSortConfig {
        overlap_threshold: 5,
        file_count_step: 10,
    };

    assert!(!needs_merge_sort(&[stat(b"a", b"z", 5, 5)], &cfg));
    assert!(needs_merge_sort(&[stat(b"a", b"z", 6, 6)], &cfg));
}

#[test]
fn test_split_data_files_in_steps() {
    let cfg = MergeSortConfig {
        overlap_threshold: 0,
        file_count_step: 4,
    };
    let stats = vec![stat(b"a", b"b", 3, 1), stat(b"c", b"d", 6, 1)];

    let chunks = split_data_files(&stats, &cfg);

    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 1]);
    assert_eq!(chunks[0][0], "data/0");
    assert!(chunks.iter().flatten().all(|name| !name.contains("_stat")));
}

#[test]
fn test_split_data_files_empty() {
    assert!(split_data_files(&[], &MergeSortConfig::default()).is_empty());
}
