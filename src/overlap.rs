//! Overlap estimation
//!
//! Sweep-line computation of the largest total weight of key intervals open
//! at any single key. Used per `MultipleFilesStat` group (each file is a
//! weight-1 interval) and across groups, where every group collapses into one
//! coarse interval weighted by its own overlap number. The cross-group figure
//! is a cheap conservative approximation, not an exact recount.

use crate::config::MergeSortConfig;
use crate::writer::MultipleFilesStat;

/// Which side of an inclusive interval an endpoint is
///
/// Variant order matters: at equal keys starts are processed before ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EndpointKind {
    InclusiveStart,
    InclusiveEnd,
}

/// One side of a weighted interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub key: Vec<u8>,
    pub kind: EndpointKind,
    pub weight: i64,
}

impl Endpoint {
    pub fn start(key: impl Into<Vec<u8>>, weight: i64) -> Self {
        Self {
            key: key.into(),
            kind: EndpointKind::InclusiveStart,
            weight,
        }
    }

    pub fn end(key: impl Into<Vec<u8>>, weight: i64) -> Self {
        Self {
            key: key.into(),
            kind: EndpointKind::InclusiveEnd,
            weight,
        }
    }
}

/// Max over all keys of the summed weight of intervals open at that key
pub fn get_max_overlapping(mut points: Vec<Endpoint>) -> i64 {
    points.sort_by(|a, b| a.key.cmp(&b.key).then(a.kind.cmp(&b.kind)));

    let mut open = 0i64;
    let mut max = 0i64;
    for point in &points {
        match point.kind {
            EndpointKind::InclusiveStart => {
                open += point.weight;
                max = max.max(open);
            }
            EndpointKind::InclusiveEnd => open -= point.weight,
        }
    }
    max
}

/// Overlap across several groups, assuming their worst case stacks up
pub fn get_max_overlapping_total(stats: &[MultipleFilesStat]) -> i64 {
    let mut points = Vec::with_capacity(stats.len() * 2);
    for stat in stats {
        points.push(Endpoint::start(stat.min_key.clone(), stat.max_overlapping_num));
    }
    for stat in stats {
        points.push(Endpoint::end(stat.max_key.clone(), stat.max_overlapping_num));
    }
    get_max_overlapping(points)
}

/// Whether the files behind `stats` overlap enough to need a merge step
pub fn needs_merge_sort(stats: &[MultipleFilesStat], cfg: &MergeSortConfig) -> bool {
    get_max_overlapping_total(stats) > cfg.overlap_threshold
}

/// Data file names in merge-task sized chunks
pub fn split_data_files(stats: &[MultipleFilesStat], cfg: &MergeSortConfig) -> Vec<Vec<String>> {
    let files: Vec<String> = stats
        .iter()
        .flat_map(|stat| stat.filenames.iter().map(|(data, _)| data.clone()))
        .collect();
    files
        .chunks(cfg.file_count_step.max(1))
        .map(<[String]>::to_vec)
        .collect()
}
