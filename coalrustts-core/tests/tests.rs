use coalrustts_core::{Position, Time};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_position_round_trip(a in 0..i64::MAX) {
        let p = Position::try_from(a).unwrap();
        prop_assert_eq!(i64::from(p), a);
    }
}

proptest! {
    #[test]
    fn test_negative_positions_rejected(a in i64::MIN..0) {
        prop_assert!(Position::try_from(a).is_err());
        prop_assert!(Position::new(a).is_none());
    }
}

proptest! {
    #[test]
    fn test_position_ordering_matches_raw(a in 0..i64::MAX, b in 0..i64::MAX) {
        let pa = Position::new_valid(a);
        let pb = Position::new_valid(b);
        prop_assert_eq!(pa < pb, a < b);
        prop_assert_eq!(pa.distance_to(pb), b - a);
    }
}

proptest! {
    #[test]
    fn test_time_scaling(t in 0.0..1e6_f64, factor in 0.0..1e3_f64) {
        let time = Time::new(t).unwrap();
        let scaled = time.scaled(factor).unwrap();
        prop_assert_eq!(scaled.raw(), t * factor);
        prop_assert!(scaled >= Time::ZERO);
    }
}

#[test]
fn test_time_try_from() {
    assert!(Time::try_from(1.0).is_ok());
    assert_eq!(
        Time::try_from(-1.0),
        Err(coalrustts_core::Error::TimeError(-1.0))
    );
}
