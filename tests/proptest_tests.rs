// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based tests using proptest.
//!
//! These tests check the merge, unflatten, filter and search invariants
//! against arbitrary inputs.

use flange::domain::config_value::unflatten;
use flange::domain::key_filter::{default_key_policy, MAX_KEY_LEN};
use flange::domain::search::search;
use flange::domain::{
    ConfigPath, ConfigValue, KeyFilter, Mapping, Merger, PathPattern, Source, SourceId,
};
use flange::adapters::EnvVarReader;
use flange::service::CfgBuilder;
use std::collections::HashMap;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

fn to_mapping(pairs: &[(String, i64)]) -> ConfigValue {
    let map: Mapping = pairs
        .iter()
        .map(|(k, v)| (k.clone(), json!(v)))
        .collect();
    ConfigValue::Object(map)
}

// Unflattening twice gives the same tree as unflattening once
proptest! {
    #[test]
    fn test_unflatten_is_idempotent(
        pairs in prop::collection::vec(("[a-c]{1,2}(__[a-c]{1,2}){0,2}", any::<i64>()), 0..12)
    ) {
        let once = unflatten(to_mapping(&pairs), "__");
        let twice = unflatten(once.clone(), "__");
        prop_assert_eq!(once, twice);
    }
}

// No key survives unflattening with the separator in it
proptest! {
    #[test]
    fn test_unflatten_removes_compound_keys(
        pairs in prop::collection::vec(("[a-c]{1,2}(__[a-c]{1,2}){0,2}", any::<i64>()), 1..12)
    ) {
        let expanded = unflatten(to_mapping(&pairs), "__");
        let mut stack = vec![&expanded];
        while let Some(ConfigValue::Object(map)) = stack.pop() {
            for (key, child) in map {
                prop_assert!(!key.contains("__"));
                stack.push(child);
            }
        }
    }
}

// The default filter drops every key that is too long
proptest! {
    #[test]
    fn test_default_filter_drops_long_keys(
        keys in prop::collection::vec("[a-z]{1,60}", 0..10)
    ) {
        let pairs: Vec<(String, i64)> = keys.iter().map(|k| (k.clone(), 1)).collect();
        let filtered = KeyFilter::default().apply(to_mapping(&pairs));
        let map = filtered.as_object().unwrap();
        for key in &keys {
            prop_assert_eq!(map.contains_key(key), key.len() < MAX_KEY_LEN);
        }
    }
}

// No rejected key reaches the merged tree or the index of a built Cfg
proptest! {
    #[test]
    fn test_built_cfg_holds_only_accepted_keys(
        data_keys in prop::collection::vec("[a-z\\x01\\t]{1,60}(__[a-z\\x07]{1,60})?", 0..8),
        env_keys in prop::collection::vec("[A-Z\\x01]{1,30}(__[A-Z]{1,60}){0,2}", 0..8)
    ) {
        let pairs: Vec<(String, i64)> = data_keys.iter().map(|k| (k.clone(), 1)).collect();
        let env: HashMap<String, String> = env_keys
            .iter()
            .map(|k| (k.clone(), "v".to_string()))
            .collect();
        let cfg = CfgBuilder::new()
            .base_dirs(Vec::<String>::new())
            .include_os_env(true)
            .env_reader(EnvVarReader::with_values(env))
            .init_data(to_mapping(&pairs))
            .build()
            .unwrap();

        let mut stack = vec![cfg.data()];
        while let Some(ConfigValue::Object(map)) = stack.pop() {
            for (key, child) in map {
                prop_assert!(key.len() < MAX_KEY_LEN);
                prop_assert!(default_key_policy(&key.as_str().into()));
                stack.push(child);
            }
        }
        for (path, _) in cfg.index().iter() {
            for key in path.keys() {
                prop_assert!(default_key_policy(key));
            }
        }
    }
}

// For scalars, the last source that sets a key decides its value
proptest! {
    #[test]
    fn test_last_writer_wins(
        layers in prop::collection::vec(
            prop::collection::vec(("[a-e]", any::<i64>()), 0..6),
            1..6
        )
    ) {
        let filter = KeyFilter::default();
        let sources: Vec<Source> = layers
            .iter()
            .map(|pairs| Source::init_data(to_mapping(pairs), &filter))
            .collect();

        let mut expected: BTreeMap<String, (i64, usize)> = BTreeMap::new();
        for (i, pairs) in layers.iter().enumerate() {
            for (key, value) in pairs {
                expected.insert(key.clone(), (*value, i));
            }
        }

        let outcome = Merger::default()
            .merge(sources.iter().enumerate().map(|(i, s)| (SourceId(i), s)));
        prop_assert!(outcome.failed.is_empty());
        prop_assert_eq!(outcome.data.as_object().unwrap().len(), expected.len());

        for (key, (value, writer)) in &expected {
            prop_assert_eq!(&outcome.data[key.as_str()], &json!(value));
            let entry = outcome.index.get(&ConfigPath::from([key.as_str()])).unwrap();
            prop_assert_eq!(entry.value(), &json!(value));
            prop_assert_eq!(entry.sources().iter().next_back(), Some(&SourceId(*writer)));
        }
    }
}

// Every exact match of a key ends with that key
proptest! {
    #[test]
    fn test_exact_search_matches_last_key(
        pairs in prop::collection::vec(("[a-c]{1,2}(__[a-c]{1,2}){0,2}", any::<i64>()), 1..12),
        needle in "[a-c]{1,2}"
    ) {
        let filter = KeyFilter::default();
        let sources = [Source::init_data(to_mapping(&pairs), &filter)];
        let outcome = Merger::default().merge([(SourceId(0), &sources[0])]);

        let pattern = PathPattern::new(&needle, true).unwrap();
        for (path, _) in search(&outcome.index, &pattern, &[]) {
            let last = path.last().and_then(|k| k.as_key());
            prop_assert_eq!(last, Some(needle.as_str()));
        }
    }
}
