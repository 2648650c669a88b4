// Property tests for resolution and the kernel option codec

use mountopts::codec;
use mountopts::{MountOpts, MountOptsMask, OptionValue, RawUserOptions, SLOPPY_MOUNT_KEY};
use proptest::collection::{btree_map, btree_set};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

fn scalar() -> impl Strategy<Value = OptionValue> {
    prop_oneof![
        "[a-zA-Z0-9./:-]{0,12}".prop_map(OptionValue::String),
        any::<i64>().prop_map(OptionValue::Integer),
        any::<u32>().prop_map(OptionValue::from),
        any::<bool>().prop_map(OptionValue::Bool),
        Just(OptionValue::Unsupported),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(opts in btree_map(key(), "([a-zA-Z][a-zA-Z0-9.=/-]{0,10})?", 0..8)) {
        let encoded = codec::encode(&opts);
        prop_assert_eq!(codec::decode(&encoded, codec::DEFAULT_SEPARATOR), opts);
    }

    #[test]
    fn encode_is_independent_of_insertion_order(
        opts in btree_map(key(), "[a-z0-9]{0,6}", 0..8)
    ) {
        let reversed: std::collections::HashMap<_, _> = opts.iter().rev().collect();
        let reversed: BTreeMap<String, String> =
            reversed.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        prop_assert_eq!(codec::encode(&opts), codec::encode(&reversed));
    }

    #[test]
    fn allowed_input_equals_defaults_overlaid(
        input in btree_map(key(), scalar(), 0..8),
        defaults in btree_map(key(), "[a-z0-9]{0,6}", 0..4),
    ) {
        prop_assume!(!defaults.contains_key(SLOPPY_MOUNT_KEY));

        let mut builder = MountOptsMask::builder().with_allowed(input.keys().cloned());
        for (k, v) in &defaults {
            builder = builder.with_default(k.clone(), v.clone());
        }
        let mask = builder.build().unwrap();

        let mut expected: MountOpts = defaults.clone();
        for (k, v) in &input {
            expected.insert(k.clone(), mask.coercer().coerce(v, k));
        }

        prop_assert_eq!(mask.resolve(&input).unwrap(), expected);
    }

    #[test]
    fn ignored_keys_never_reach_the_result(
        input in btree_map(key(), scalar(), 1..8),
        ignored in btree_set(key(), 1..4),
    ) {
        prop_assume!(!input.contains_key(SLOPPY_MOUNT_KEY));

        let mask = MountOptsMask::builder()
            .with_allowed(input.keys().cloned())
            .with_ignored(ignored.iter().cloned())
            .build()
            .unwrap();

        let resolved = mask.resolve(&input).unwrap();
        for key in &ignored {
            prop_assert!(!resolved.contains_key(key));
        }
    }

    #[test]
    fn strict_masks_report_every_unknown_key(
        input in btree_map(key(), scalar(), 0..8),
        allowed in btree_set(key(), 0..4),
    ) {
        let mask = MountOptsMask::builder().with_allowed(allowed.iter().cloned()).build().unwrap();
        let unknown: Vec<&str> =
            input.keys().filter(|k| !allowed.contains(*k)).map(String::as_str).collect();

        match mask.resolve(&input) {
            Ok(_) => prop_assert!(unknown.is_empty()),
            Err(err) => prop_assert_eq!(err.not_allowed(), unknown),
        }
    }

    #[test]
    fn sloppy_masks_drop_unknown_keys(
        input in btree_map(key(), scalar(), 0..8),
        allowed in btree_set(key(), 1..4),
    ) {
        let mask = MountOptsMask::builder()
            .with_allowed(allowed.iter().cloned())
            .with_default(SLOPPY_MOUNT_KEY, true)
            .build()
            .unwrap();

        let resolved = mask.resolve(&input).unwrap();
        for key in resolved.keys() {
            prop_assert!(allowed.contains(key) || key == SLOPPY_MOUNT_KEY);
        }
    }
}

#[test]
fn sloppy_mount_with_empty_allow_list_passes_everything() {
    let mask = MountOptsMask::builder().with_default(SLOPPY_MOUNT_KEY, "true").build().unwrap();
    let input: RawUserOptions = [("opt1", "val1"), ("opt2", "val2"), ("opt3", "val3")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), OptionValue::from(v)))
        .collect();

    let resolved = mask.resolve(&input).unwrap();
    assert_eq!(resolved.len(), 4);
    assert_eq!(resolved.get(SLOPPY_MOUNT_KEY).map(String::as_str), Some("true"));
}
