mod common;

use common::*;
use nucleiseg::PARAM_COUNT;

#[test]
fn test_wrong_length_is_rejected() {
    for len in [0, 8, 11] {
        let values = vec![0.0; len];
        match ParameterVector::from_slice(&values) {
            Err(SegmentError::InvalidParameterCount { expected, found }) => {
                assert_eq!(expected, PARAM_COUNT);
                assert_eq!(found, len);
            }
            other => panic!("length {len} should be rejected, got {:?}", other),
        }
    }
}

#[test]
fn test_out_of_range_value_names_its_index() {
    let cases: [(usize, f32); 5] = [
        (1, -1.0),      // negative background radius
        (5, 1.5),       // centre weight above 1
        (8, -0.1),      // watershed ratio below 0
        (9, 0.5),       // border flag not boolean
        (3, f32::NAN),  // non-finite threshold
    ];

    for (index, value) in cases {
        let mut values = *ParameterVector::default().as_array();
        values[index] = value;
        match ParameterVector::new(values) {
            Err(SegmentError::InvalidParameter { index: reported, name, .. }) => {
                assert_eq!(reported, index);
                assert_eq!(Param::from_index(index).map(Param::name), Some(name));
            }
            other => panic!("index {index} = {value} should be rejected, got {:?}", other),
        }
    }
}

#[test]
fn test_negative_threshold_is_allowed() -> anyhow::Result<()> {
    let params = ParameterVector::default().with(Param::Threshold, -0.2)?;
    assert_eq!(params.threshold(), -0.2);
    Ok(())
}

#[test]
fn test_failed_edit_leaves_vector_unchanged() {
    let mut params = ParameterVector::default();
    let before = params;

    assert!(params.set(Param::MinObjectSize, -5.0).is_err());
    assert_eq!(params, before);
}

#[test]
fn test_typed_accessors() -> anyhow::Result<()> {
    let params = ParameterVector::new([0.0, 50.0, 2.0, 0.25, 20.0, 0.4, 7.0, 3.0, 0.6, 1.0])?;

    assert_eq!(params.clip_limit(), None, "zero disables clipping");
    assert_eq!(params.bg_radius(), 50.0);
    assert_eq!(params.min_object_size(), 20);
    assert_eq!(params.min_separation(), 7);
    assert!(params.exclude_border());

    let clipped = params.with(Param::ClipLimit, 900.0)?;
    assert_eq!(clipped.clip_limit(), Some(900.0));
    Ok(())
}

#[test]
fn test_names_round_trip() {
    for param in Param::ALL {
        assert_eq!(Param::from_name(param.name()), Some(param));
        assert_eq!(Param::from_index(param.index()), Some(param));
    }
    assert_eq!(Param::from_name("no_such_param"), None);
    assert_eq!(Param::from_index(PARAM_COUNT), None);
}

#[test]
fn test_json_array_persistence() -> anyhow::Result<()> {
    let params = ParameterVector::new([1200.0, 40.0, 2.0, 0.3, 25.0, 0.5, 6.0, 1.0, 0.4, 1.0])?;

    let json = serde_json::to_string(&params)?;
    assert!(json.starts_with('[') && json.ends_with(']'));

    let loaded: ParameterVector = serde_json::from_str(&json)?;
    assert_eq!(loaded, params);
    Ok(())
}

#[test]
fn test_legacy_nine_entry_vector_loads() -> anyhow::Result<()> {
    let loaded: ParameterVector =
        serde_json::from_str("[0, 30, 2, 0.25, 20, 0.5, 5, 2, 0.5]")?;

    assert!(!loaded.exclude_border());
    assert_eq!(loaded.bg_radius(), 30.0);
    assert_eq!(loaded.watershed_ratio(), 0.5);
    Ok(())
}

#[test]
fn test_invalid_persisted_vector_fails_to_load() {
    let short: Result<ParameterVector, _> = serde_json::from_str("[0, 30, 2]");
    assert!(short.is_err());

    let bad_weight: Result<ParameterVector, _> =
        serde_json::from_str("[0, 30, 2, 0.25, 20, 7, 5, 2, 0.5, 0]");
    assert!(bad_weight.is_err());
}

#[test]
fn test_slider_ranges() {
    let spec = Param::Threshold.spec();
    assert_eq!((spec.min, spec.max, spec.step), (0.0, Some(1.0), 0.01));

    assert_eq!(Param::ClipLimit.spec().max, None);
    assert_eq!(Param::BackgroundRadius.spec().max, Some(300.0));
    assert_eq!(Param::MinSeparation.spec().min, 5.0);
}
