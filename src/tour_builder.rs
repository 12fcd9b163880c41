/// Greedy Tour Builder
///
/// Orders survey segments into one continuous track by repeatedly appending
/// the unplaced segment whose nearer endpoint lies closest to the current
/// tail, flipping it when its end is the nearer one.

use geo::Coord;
use log::info;

use crate::descriptor::SegmentDescriptor;
use crate::geodesy::coord_distance_km;
use crate::records::Dataset;

/// How the first segment of a tour is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedStrategy {
    /// The segment whose start lies farthest from every other segment's end.
    FarthestStart,
    /// The segment whose start lies closest to an external point.
    Anchored(Coord<f64>),
}

/// A descriptor placed in the tour.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedSegment {
    pub descriptor: SegmentDescriptor,
    /// 1-based position in the tour.
    pub sequence_index: usize,
    pub reversed: bool,
    pub assigned_name: String,
}

impl OrderedSegment {
    /// First position when walked in tour direction.
    pub fn head(&self) -> Coord<f64> {
        if self.reversed {
            self.descriptor.end
        } else {
            self.descriptor.start
        }
    }

    /// Last position when walked in tour direction.
    pub fn tail(&self) -> Coord<f64> {
        if self.reversed {
            self.descriptor.start
        } else {
            self.descriptor.end
        }
    }
}

/// Order every descriptor into a tour. Empty input yields an empty tour.
pub fn build_tour(
    mut remaining: Vec<SegmentDescriptor>,
    seed: SeedStrategy,
    river: &str,
    dataset: Dataset,
) -> Vec<OrderedSegment> {
    let mut tour: Vec<OrderedSegment> = Vec::with_capacity(remaining.len());
    if remaining.is_empty() {
        return tour;
    }

    let seed_index = match seed {
        SeedStrategy::FarthestStart => farthest_start(&remaining),
        SeedStrategy::Anchored(anchor) => closest_start(&remaining, anchor),
    };
    let first = remaining.remove(seed_index);
    info!("Seed {} segment: {}", dataset, first.source.display());
    tour.push(place(first, false, 1, river, dataset));

    while !remaining.is_empty() {
        let tail = match tour.last() {
            Some(last) => last.tail(),
            None => break,
        };

        let mut best: Option<(usize, bool)> = None;
        let mut best_dist = f64::INFINITY;

        for (i, candidate) in remaining.iter().enumerate() {
            let dist_forward = coord_distance_km(candidate.start, tail);
            let dist_reverse = coord_distance_km(candidate.end, tail);

            let (dist, reversed) = if dist_forward <= dist_reverse {
                (dist_forward, false)
            } else {
                (dist_reverse, true)
            };

            if best.is_none() || dist < best_dist {
                best_dist = dist;
                best = Some((i, reversed));
            }
        }

        let Some((index, reversed)) = best else { break };
        let next = remaining.remove(index);
        let sequence_index = tour.len() + 1;
        tour.push(place(next, reversed, sequence_index, river, dataset));
    }

    tour
}

fn place(
    descriptor: SegmentDescriptor,
    reversed: bool,
    sequence_index: usize,
    river: &str,
    dataset: Dataset,
) -> OrderedSegment {
    OrderedSegment {
        assigned_name: dataset.segment_name(river, sequence_index),
        descriptor,
        sequence_index,
        reversed,
    }
}

/// Index of the segment whose start has the greatest maximum distance to the
/// other segments' ends. A lone segment is index 0.
fn farthest_start(descriptors: &[SegmentDescriptor]) -> usize {
    let mut best_index = 0;
    let mut best_reach = f64::NEG_INFINITY;

    for (i, candidate) in descriptors.iter().enumerate() {
        let reach = descriptors
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| coord_distance_km(candidate.start, other.end))
            .fold(f64::NEG_INFINITY, f64::max);

        if reach > best_reach {
            best_reach = reach;
            best_index = i;
        }
    }

    best_index
}

fn closest_start(descriptors: &[SegmentDescriptor], anchor: Coord<f64>) -> usize {
    let mut best_index = 0;
    let mut best_dist = f64::INFINITY;

    for (i, candidate) in descriptors.iter().enumerate() {
        let dist = coord_distance_km(candidate.start, anchor);
        if dist < best_dist {
            best_dist = dist;
            best_index = i;
        }
    }

    best_index
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn seg(name: &str, start: (f64, f64), end: (f64, f64)) -> SegmentDescriptor {
        SegmentDescriptor {
            source: PathBuf::from(name),
            start: Coord { x: start.0, y: start.1 },
            end: Coord { x: end.0, y: end.1 },
            point_count: 150,
        }
    }

    fn names(tour: &[OrderedSegment]) -> Vec<(String, bool)> {
        tour.iter()
            .map(|s| (s.descriptor.source.to_string_lossy().to_string(), s.reversed))
            .collect()
    }

    fn abc() -> Vec<SegmentDescriptor> {
        vec![
            seg("A", (-90.0, 30.0), (-90.1, 30.1)),
            seg("B", (-90.1, 30.1), (-90.2, 30.2)),
            seg("C", (-89.0, 29.0), (-90.05, 30.05)),
        ]
    }

    #[test]
    fn test_three_segment_tour() {
        let tour = build_tour(abc(), SeedStrategy::FarthestStart, "RIVER", Dataset::Resistivity);

        // From C's end, A's end is ~1.6 m nearer than A's start, so A flips.
        // B's start coincides with A's end and loses the tie to A.
        assert_eq!(
            names(&tour),
            vec![("C".to_string(), false), ("A".to_string(), true), ("B".to_string(), false)]
        );
        assert_eq!(tour[1].tail(), Coord { x: -90.0, y: 30.0 });
        assert_eq!(tour[2].assigned_name, "RIVER_003.txt");
    }

    #[test]
    fn test_permutation_and_first_forward() {
        let descriptors: Vec<_> = (0..12)
            .map(|i| {
                let x = -90.0 - (i * 7 % 12) as f64 * 0.05;
                let y = 30.0 + (i * 5 % 12) as f64 * 0.03;
                seg(&format!("s{i:02}"), (x, y), (x - 0.02, y + 0.01))
            })
            .collect();

        for strategy in [SeedStrategy::FarthestStart, SeedStrategy::Anchored(Coord { x: -90.3, y: 30.2 })] {
            let tour = build_tour(descriptors.clone(), strategy, "R", Dataset::WaterQuality);
            assert_eq!(tour.len(), descriptors.len());
            assert!(!tour[0].reversed);

            let indices: Vec<_> = tour.iter().map(|s| s.sequence_index).collect();
            assert_eq!(indices, (1..=12).collect::<Vec<_>>());

            let mut sources: Vec<_> = tour.iter().map(|s| s.descriptor.source.clone()).collect();
            sources.sort();
            let mut expected: Vec<_> = descriptors.iter().map(|d| d.source.clone()).collect();
            expected.sort();
            assert_eq!(sources, expected);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = build_tour(abc(), SeedStrategy::FarthestStart, "R", Dataset::Resistivity);
        let b = build_tour(abc(), SeedStrategy::FarthestStart, "R", Dataset::Resistivity);
        assert_eq!(a, b);
    }

    #[test]
    fn test_anchor_picks_closest_start() {
        let descriptors = vec![
            seg("far", (-95.0, 35.0), (-95.1, 35.1)),
            seg("near", (-90.01, 30.01), (-90.2, 30.2)),
        ];
        let tour = build_tour(
            descriptors,
            SeedStrategy::Anchored(Coord { x: -90.0, y: 30.0 }),
            "R",
            Dataset::WaterQuality,
        );
        assert_eq!(tour[0].descriptor.source, PathBuf::from("near"));
        assert!(!tour[0].reversed);
        assert_eq!(tour[0].assigned_name, "R_001_WQ.csv");
    }

    #[test]
    fn test_anchor_ignores_segment_end() {
        // The end of "a" sits on the anchor but only starts are compared.
        let descriptors = vec![
            seg("a", (-91.0, 31.0), (-90.0, 30.0)),
            seg("b", (-90.5, 30.5), (-92.0, 32.0)),
        ];
        let tour = build_tour(
            descriptors,
            SeedStrategy::Anchored(Coord { x: -90.0, y: 30.0 }),
            "R",
            Dataset::WaterQuality,
        );
        assert_eq!(tour[0].descriptor.source, PathBuf::from("b"));
    }

    #[test]
    fn test_single_segment_is_forward() {
        let tour = build_tour(
            vec![seg("only", (-90.0, 30.0), (-90.1, 30.1))],
            SeedStrategy::FarthestStart,
            "R",
            Dataset::Resistivity,
        );
        assert_eq!(tour.len(), 1);
        assert!(!tour[0].reversed);
        assert_eq!(tour[0].sequence_index, 1);
    }

    #[test]
    fn test_empty_input() {
        let tour = build_tour(Vec::new(), SeedStrategy::FarthestStart, "R", Dataset::Resistivity);
        assert!(tour.is_empty());
    }

    #[test]
    fn test_tail_follows_orientation() {
        // After "mid" is reversed its functional end is its original start,
        // which is where "last" begins.
        let descriptors = vec![
            seg("first", (-90.0, 30.0), (-90.1, 30.1)),
            seg("mid", (-90.3, 30.3), (-90.1, 30.1)),
            seg("last", (-90.3, 30.3), (-90.4, 30.4)),
        ];
        let tour = build_tour(
            descriptors,
            SeedStrategy::Anchored(Coord { x: -90.0, y: 30.0 }),
            "R",
            Dataset::Resistivity,
        );
        assert_eq!(
            names(&tour),
            vec![
                ("first".to_string(), false),
                ("mid".to_string(), true),
                ("last".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_equal_distances_keep_forward() {
        // A loop survey begins and ends at the same fix, so both orientations
        // are the same distance from the tail.
        let descriptors = vec![
            seg("first", (-90.0, 30.0), (-90.1, 30.1)),
            seg("loop", (-90.3, 30.3), (-90.3, 30.3)),
        ];

        let tour = build_tour(
            descriptors,
            SeedStrategy::Anchored(Coord { x: -90.0, y: 30.0 }),
            "R",
            Dataset::Resistivity,
        );
        assert_eq!(
            names(&tour),
            vec![("first".to_string(), false), ("loop".to_string(), false)]
        );
    }
}
