use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use serde_json::{json, Value};
use shared::{
    domain::{Cid, Guid, PeerId, Timestamp},
    protocol::{Concept, PeerInfo},
};

use super::*;

fn raw(value: Value) -> RawMessage {
    RawMessage::from(value.to_string())
}

fn concept_json(guid: &str, name: &str, millis: i64) -> Value {
    json!({
        "Guid": guid,
        "Name": name,
        "Description": "d",
        "Type": "t",
        "Content": "c",
        "Cid": format!("bafy-{guid}-{name}"),
        "Timestamp": millis,
    })
}

fn concept_mirror() -> EntityMirror<ConceptPolicy> {
    EntityMirror::new("concepts")
}

fn peer_mirror() -> EntityMirror<PeerPolicy> {
    EntityMirror::new("peers")
}

#[test]
fn submitted_concept_broadcast_lands_as_single_entry() {
    let mut mirror = concept_mirror();
    let snapshot = mirror
        .apply(&raw(json!({
            "Guid": "g1",
            "Name": "A",
            "Description": "d",
            "Type": "t",
            "Content": "c",
            "Cid": "bafy123",
            "Timestamp": 1,
        })))
        .expect("apply");

    assert_eq!(snapshot.len(), 1);
    let concept = snapshot.get(&Guid::from("g1")).expect("g1 present");
    assert_eq!(
        concept,
        &Concept {
            guid: Guid::from("g1"),
            name: "A".into(),
            description: "d".into(),
            kind: "t".into(),
            content: "c".into(),
            cid: Some(Cid::from("bafy123")),
            timestamp: Timestamp::from_millis(1).expect("ts"),
        }
    );
    assert_eq!(mirror.generation(), 1);
}

#[test]
fn upsert_overwrites_whole_entity_and_keeps_first_seen_position() {
    let mut mirror = concept_mirror();
    mirror.apply(&raw(concept_json("g1", "one", 1))).expect("apply");
    mirror.apply(&raw(concept_json("g2", "two", 2))).expect("apply");

    let mut update = concept_json("g1", "one-renamed", 3);
    update["Cid"] = json!("");
    let snapshot = mirror.apply(&raw(update)).expect("apply");

    let keys: Vec<&str> = snapshot.keys().map(Guid::as_str).collect();
    assert_eq!(keys, vec!["g1", "g2"]);
    let g1 = snapshot.get(&Guid::from("g1")).expect("g1");
    assert_eq!(g1.name, "one-renamed");
    // whole-entity overwrite: the cleared Cid does not survive from the earlier value
    assert_eq!(g1.cid, None);
}

#[test]
fn applying_the_same_upsert_twice_is_idempotent() {
    let message = raw(concept_json("g1", "A", 1));

    let mut once = concept_mirror();
    once.apply(&message).expect("apply");

    let mut twice = concept_mirror();
    twice.apply(&message).expect("apply");
    twice.apply(&message).expect("apply");

    assert_eq!(*once.current(), *twice.current());
}

#[test]
fn decode_failure_leaves_snapshot_and_generation_untouched() {
    let mut mirror = concept_mirror();
    mirror.apply(&raw(concept_json("g1", "A", 1))).expect("apply");
    let before = mirror.current();
    let generation = mirror.generation();

    for bad in [
        RawMessage::from("not json"),
        RawMessage::from("{\"Guid\":"),
        raw(json!({ "Name": "missing guid", "Description": "d", "Type": "t", "Timestamp": 1 })),
        raw(json!([1, 2, 3])),
        RawMessage::from(vec![0xff, 0xfe, 0x00]),
    ] {
        let err = mirror.apply(&bad).expect_err("decode failure");
        assert_eq!(err.collection, "concepts");
        assert_eq!(*mirror.current(), *before);
        assert_eq!(mirror.generation(), generation);
    }
}

#[test]
fn previously_published_snapshot_is_not_mutated_by_later_applies() {
    let mut mirror = concept_mirror();
    let first = mirror.apply(&raw(concept_json("g1", "A", 1))).expect("apply");
    mirror.apply(&raw(concept_json("g1", "B", 2))).expect("apply");
    mirror.apply(&raw(concept_json("g2", "C", 3))).expect("apply");

    assert_eq!(first.len(), 1);
    assert_eq!(first.get(&Guid::from("g1")).expect("g1").name, "A");
    assert_eq!(mirror.current().len(), 2);
}

#[test]
fn peer_full_replace_drops_peers_missing_from_latest_payload() {
    let mut mirror = peer_mirror();
    mirror
        .apply(&raw(json!({ "p1": { "Timestamp": 100, "CIDs": ["cid1"] } })))
        .expect("apply");
    let snapshot = mirror
        .apply(&raw(json!({ "p2": { "Timestamp": 200, "CIDs": [] } })))
        .expect("apply");

    assert_eq!(snapshot.len(), 1);
    assert!(!snapshot.contains_key(&PeerId::from("p1")));
    let p2 = snapshot.get(&PeerId::from("p2")).expect("p2");
    assert_eq!(p2.timestamp, Timestamp::from_millis(200).expect("ts"));
    assert!(p2.cids.is_empty());
}

#[test]
fn null_peer_payload_is_an_empty_collection() {
    let mut mirror = peer_mirror();
    mirror
        .apply(&raw(json!({ "p1": { "Timestamp": 100, "CIDs": ["cid1"] } })))
        .expect("apply");

    let snapshot = mirror.apply(&RawMessage::from("null")).expect("null is valid");
    assert!(snapshot.is_empty());
    assert_eq!(mirror.generation(), 2);
}

#[test]
fn malformed_peer_payload_keeps_previous_table() {
    let mut mirror = peer_mirror();
    mirror
        .apply(&raw(json!({ "p1": { "Timestamp": 100, "CIDs": ["cid1"] } })))
        .expect("apply");
    let before = mirror.current();

    assert!(mirror
        .apply(&raw(json!({ "p2": { "CIDs": "not-a-list" } })))
        .is_err());
    assert_eq!(*mirror.current(), *before);
}

fn key_pool() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec((0usize..6, "[a-z]{0,6}"), 0..40)
}

fn peer_table() -> impl Strategy<Value = BTreeMap<String, (i64, Vec<String>)>> {
    prop::collection::btree_map(
        "p[0-9]",
        (0i64..1_000_000, prop::collection::vec("c[a-z]{1,3}", 0..4)),
        0..6,
    )
}

fn peer_payload(table: &BTreeMap<String, (i64, Vec<String>)>) -> Value {
    let map: serde_json::Map<String, Value> = table
        .iter()
        .map(|(peer, (millis, cids))| {
            (
                peer.clone(),
                json!({ "Timestamp": millis, "CIDs": cids }),
            )
        })
        .collect();
    Value::Object(map)
}

proptest! {
    #[test]
    fn upsert_keeps_last_value_per_key_and_every_key_seen(ops in key_pool()) {
        let mut mirror = concept_mirror();
        let mut last: HashMap<String, String> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();

        for (millis, (key, name)) in ops.iter().enumerate() {
            let guid = format!("g{key}");
            mirror
                .apply(&raw(concept_json(&guid, name, millis as i64)))
                .expect("apply");
            if !last.contains_key(&guid) {
                first_seen.push(guid.clone());
            }
            last.insert(guid, name.clone());
        }

        let snapshot = mirror.current();
        let keys: Vec<String> = snapshot.keys().map(|k| k.to_string()).collect();
        prop_assert_eq!(keys, first_seen);
        for (guid, name) in &last {
            let concept = snapshot.get(&Guid::from(guid.as_str())).expect("seen key");
            prop_assert_eq!(&concept.name, name);
        }
        prop_assert_eq!(mirror.generation(), ops.len() as u64);
    }

    #[test]
    fn full_replace_equals_latest_payload(tables in prop::collection::vec(peer_table(), 1..6)) {
        let mut mirror = peer_mirror();
        for table in &tables {
            mirror.apply(&raw(peer_payload(table))).expect("apply");
        }

        let latest = tables.last().expect("at least one table");
        let expected: PeerSnapshot = latest
            .iter()
            .map(|(peer, (millis, cids))| {
                (
                    PeerId::from(peer.as_str()),
                    PeerInfo {
                        timestamp: Timestamp::from_millis(*millis).expect("ts"),
                        cids: cids.iter().map(|c| Cid::from(c.as_str())).collect(),
                        owner_guid: None,
                    },
                )
            })
            .collect();
        prop_assert_eq!(&*mirror.current(), &expected);
    }
}
