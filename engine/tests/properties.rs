//! Property-based checks over whole sync runs.

mod common;

use common::{inventory_schema, memory};
use proptest::prelude::*;
use serde_json::{json, Value};
use ssot_engine::{
    diff_stores, Adapter, CancellationToken, DiffOptions, MemoryAdapter, NoMemory, SyncOptions,
    Synchronizer,
};
use std::collections::BTreeMap;
use std::sync::Arc;

type Devices = BTreeMap<u8, (String, BTreeMap<i64, String>)>;

fn arb_devices() -> impl Strategy<Value = Devices> {
    let containers = prop::collection::btree_map(1i64..6, "lc-[ab]", 0..4);
    prop::collection::btree_map(0u8..6, ("leaf|spine", containers), 0..5)
}

fn arb_vlans() -> impl Strategy<Value = BTreeMap<i64, String>> {
    prop::collection::btree_map(1i64..50, "[a-c]{1,2}", 0..8)
}

fn records(devices: &Devices, vlans: &BTreeMap<i64, String>) -> Value {
    let devices: Vec<Value> = devices
        .iter()
        .map(|(n, (role, containers))| {
            let name = format!("sw{n}");
            let containers: Vec<Value> = containers
                .iter()
                .map(|(slot, model)| json!({"device": name, "slot": slot, "model": model}))
                .collect();
            json!({"name": name, "role": role, "containers": containers})
        })
        .collect();
    let vlans: Vec<Value> = vlans
        .iter()
        .map(|(vid, name)| json!({"vid": vid, "name": name}))
        .collect();
    json!({"device": devices, "vlan": vlans})
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_second_diff_after_sync_is_empty(
        source_devices in arb_devices(),
        source_vlans in arb_vlans(),
        target_devices in arb_devices(),
        target_vlans in arb_vlans(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let mut source = memory("source", records(&source_devices, &source_vlans));
            let mut target = memory("target", records(&target_devices, &target_vlans));

            let report = Synchronizer::new(SyncOptions::new())
                .with_probe(Arc::new(NoMemory))
                .run(&mut source, &mut target)
                .await;
            prop_assert!(report.is_completed());
            prop_assert_eq!(report.applied.failed, 0);

            // Reload both sides from scratch so the check covers what was persisted.
            let cancel = CancellationToken::new();
            let mut reloaded = MemoryAdapter::new("target", inventory_schema())
                .with_snapshot(target.snapshot().unwrap());
            reloaded.load(&cancel).await.unwrap();
            source.load(&cancel).await.unwrap();

            let diff = diff_stores(source.store(), reloaded.store(), &DiffOptions::new()).unwrap();
            prop_assert!(!diff.has_changes());
            prop_assert_eq!(
                diff.summary().no_change,
                source.store().count(None)
            );
            Ok(())
        })?;
    }
}
