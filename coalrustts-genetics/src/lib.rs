//! Recombination maps for coalescent simulation

mod recombination_map;

pub use recombination_map::RecombinationMap;
pub use recombination_map::RecombinationMapBuilder;
pub use recombination_map::RecombinationMapError;
pub use recombination_map::RecombinationMapStatus;
pub use recombination_map::RecombinationRegion;

#[cfg(test)]
mod tests {
    use super::*;
    use coalrustts_core::Position;

    fn pos(x: i64) -> Position {
        Position::new_valid(x)
    }

    #[test]
    fn test_recombination_region() {
        assert!(RecombinationRegion::new(0, 1, 1e-3).is_some());
        assert!(RecombinationRegion::new(0, 1, 0.0).is_some());
        assert!(RecombinationRegion::new(0, 1, -1e-3).is_none());
        assert!(RecombinationRegion::new(0, 1, f64::NAN).is_none());
        assert!(RecombinationRegion::new(0, 1, f64::INFINITY).is_none());
        assert!(RecombinationRegion::new(1, 0, 1e-3).is_none());
        assert!(RecombinationRegion::new(1, 1, 1e-3).is_none());
        assert!(RecombinationRegion::new(-1, 1, 1e-3).is_none());
    }

    #[test]
    fn test_bad_maps() {
        assert_eq!(
            RecombinationMap::new(vec![pos(0)], vec![]).unwrap_err(),
            RecombinationMapError::EmptyMap
        );
        assert_eq!(
            RecombinationMap::new(vec![pos(1), pos(2)], vec![0.1]).unwrap_err(),
            RecombinationMapError::FirstPositionNotZero { found: pos(1) }
        );
        assert_eq!(
            RecombinationMap::new(vec![pos(0), pos(5), pos(5)], vec![0.1, 0.1]).unwrap_err(),
            RecombinationMapError::PositionsNotIncreasing { index: 2 }
        );
        assert_eq!(
            RecombinationMap::new(vec![pos(0), pos(5)], vec![0.1, 0.1]).unwrap_err(),
            RecombinationMapError::LengthMismatch {
                positions: 2,
                rates: 2
            }
        );
        assert!(matches!(
            RecombinationMap::new(vec![pos(0), pos(5)], vec![-0.1]).unwrap_err(),
            RecombinationMapError::InvalidRate { index: 0, .. }
        ));
    }

    #[test]
    fn test_cumulative_rate() {
        let map = RecombinationMap::new(vec![pos(0), pos(10), pos(20)], vec![1.0, 2.0]).unwrap();
        assert_eq!(map.total_rate(), 30.0);
        assert_eq!(map.cumulative_rate(pos(0)), 0.0);
        assert_eq!(map.cumulative_rate(pos(5)), 5.0);
        assert_eq!(map.cumulative_rate(pos(10)), 10.0);
        assert_eq!(map.cumulative_rate(pos(15)), 20.0);
        assert_eq!(map.cumulative_rate(pos(20)), 30.0);
        assert_eq!(map.cumulative_rate(pos(200)), 30.0);
        assert_eq!(map.position_at(5.0), 5.0);
        assert_eq!(map.position_at(20.0), 15.0);
        assert_eq!(map.position_at(100.0), 20.0);
    }

    #[test]
    fn test_link_rate() {
        let map = RecombinationMap::uniform(pos(100), 1.0).unwrap();
        // breakpoints 11..=19 each carry one unit
        assert_eq!(map.link_rate(pos(10), pos(20)), 9.0);
        assert_eq!(map.link_rate(pos(10), pos(11)), 0.0);
        assert_eq!(map.link_rate(pos(10), pos(12)), 1.0);
    }

    #[test]
    fn test_breakpoint_bounds() {
        let map = RecombinationMap::uniform(pos(100), 1.0).unwrap();
        assert_eq!(map.draw_breakpoint_between(pos(10), pos(12), 0.0), Some(pos(11)));
        assert_eq!(map.draw_breakpoint_between(pos(10), pos(12), 0.999), Some(pos(11)));
        assert_eq!(map.draw_breakpoint_between(pos(10), pos(11), 0.5), None);
        assert_eq!(map.draw_breakpoint_between(pos(0), pos(100), 0.0), Some(pos(1)));
        assert_eq!(map.draw_breakpoint_between(pos(0), pos(100), 1.0), Some(pos(99)));
    }

    #[test]
    fn test_zero_rate_regions_skipped() {
        let map = RecombinationMap::new(
            vec![pos(0), pos(10), pos(90), pos(100)],
            vec![1.0, 0.0, 1.0],
        )
        .unwrap();
        for i in 0..1000 {
            let u = (i as f64) / 1000.0;
            let b = map.draw_breakpoint(u).unwrap();
            assert!((b > 0 && b <= 10) || (b > 90 && b < 100), "{}", b);
        }
    }

    #[test]
    fn test_builder() {
        let builder = RecombinationMapBuilder::default()
            .extend_regions(&[RecombinationRegion::new(50, 60, 1e-3).unwrap()])
            .extend_regions(&[RecombinationRegion::new(10, 20, 2e-3).unwrap()])
            .sequence_length(pos(100));
        assert_eq!(builder.regions().len(), 2);
        assert_eq!(builder.validate(), RecombinationMapStatus::Valid);
        let map = RecombinationMap::new_from_builder(builder).unwrap();
        assert_eq!(
            map.positions(),
            &[pos(0), pos(10), pos(20), pos(50), pos(60), pos(100)]
        );
        assert_eq!(map.rates(), &[0.0, 2e-3, 0.0, 1e-3, 0.0]);
    }

    #[test]
    fn test_builder_status() {
        assert_eq!(
            RecombinationMapBuilder::default().validate(),
            RecombinationMapStatus::Empty
        );
        let builder = RecombinationMapBuilder::default().extend_regions(&[
            RecombinationRegion::new(0, 20, 1e-3).unwrap(),
            RecombinationRegion::new(10, 30, 1e-3).unwrap(),
        ]);
        assert_eq!(
            builder.validate(),
            RecombinationMapStatus::OverlappingRegions
        );
        assert_eq!(
            RecombinationMap::new_from_builder(builder).unwrap_err(),
            RecombinationMapError::InvalidBuilder(RecombinationMapStatus::OverlappingRegions)
        );
        let builder = RecombinationMapBuilder::default()
            .extend_regions(&[RecombinationRegion::new(0, 20, 1e-3).unwrap()])
            .sequence_length(pos(10));
        assert_eq!(
            builder.validate(),
            RecombinationMapStatus::RegionBeyondSequenceEnd
        );
    }
}
