use std::collections::BTreeMap as StdMap;

use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use vec_btree::BTree;

#[test]
fn insert_then_get() {
    let keys = [5, 7, 17, 23, 31, 37, 43, 59, 61, 67, 71, 79, 83, 89, 97, 101];
    let mut tree = BTree::<i32, String>::new(3);
    for &k in &keys {
        tree.insert(k, k.to_string());
    }
    tree.check_all_invariants();

    assert_eq!(tree.get(&43), Some(&"43".to_string()));
    assert_eq!(tree.get(&7), Some(&"7".to_string()));
    assert_eq!(tree.get(&72), None);
    assert_eq!(tree.get(&696969), None);
    assert_eq!(tree.size(), keys.len());
}

#[test]
fn upsert_replaces_the_value_not_the_shape() {
    let mut tree = BTree::<i32, &str>::new(4);
    tree.insert(42, "a");
    tree.insert(42, "b");
    tree.check_all_invariants();

    assert_eq!(tree.get(&42), Some(&"b"));
    assert_eq!(tree.size(), 1);
    assert_eq!(tree.height(), 1);
}

#[test]
fn random_inserts_hold_invariants() {
    for degree in 2..10 {
        let mut rng = StdRng::seed_from_u64(424242 + degree as u64);
        let mut tree = BTree::<i32, String>::new(degree);

        for _ in 0..10_000 {
            let key = rng.gen_range(0..1000);
            let value = format!("value-{}", rng.gen_range(0..1000));
            tree.insert(key, value.clone());

            tree.check_all_invariants();
            assert_eq!(tree.get(&key), Some(&value));
        }

        let n = tree.size() as f64;
        let bound = ((n + 1.0) / 2.0).ln() / (degree as f64).ln() + 1.0;
        assert!(
            tree.height() as f64 <= bound + 1e-9,
            "height {} exceeds the bound {} for degree {}",
            tree.height(),
            bound,
            degree
        );
    }
}

#[test]
fn random_deletes_drain_the_tree() {
    for degree in 2..10 {
        let mut rng = StdRng::seed_from_u64(424242 + degree as u64);
        let mut tree = BTree::<i32, String>::new(degree);
        let mut inserted = Vec::new();

        for _ in 0..10_000 {
            let key = rng.gen_range(0..1000);
            let value = format!("value-{}", rng.gen_range(0..1000));
            tree.insert(key, value);
            inserted.push(key);
        }
        tree.check_all_invariants();

        let mut height = tree.height();
        for key in &inserted {
            tree.erase_one(key);

            tree.check_all_invariants();
            assert_eq!(tree.get(key), None);
            let now = tree.height();
            assert!(now <= height, "height grew while draining");
            height = now;
        }

        assert!(tree.empty());
        assert_eq!(tree.height(), 0);
        assert!(!tree.erase_one(&123456));
    }
}

#[test]
fn deleting_the_root_separator_collapses_the_tree() {
    let mut tree = BTree::<i32, i32>::new(2);
    for k in [1, 2, 3] {
        tree.insert(k, k);
    }
    assert_eq!(tree.height(), 2);

    assert!(tree.erase_one(&2));
    tree.check_all_invariants();

    assert_eq!(tree.height(), 1);
    assert_eq!(tree.size(), 2);
    assert_eq!(tree.get(&1), Some(&1));
    assert_eq!(tree.get(&3), Some(&3));
    assert_eq!(tree.get(&2), None);
}

#[test]
fn cascading_merges_collapse_the_root() {
    let mut tree = BTree::<i32, i32>::new(2);
    for k in 1..=7 {
        tree.insert(k, k);
    }
    // three levels: root [4] over [2] and [6]
    assert_eq!(tree.height(), 3);

    // neither child of the root can donate, so the delete merges twice on
    // its way down and the root empties out
    assert!(tree.erase_one(&4));
    tree.check_all_invariants();

    assert_eq!(tree.height(), 2);
    assert_eq!(tree.get(&4), None);
    for k in [1, 2, 3, 5, 6, 7] {
        assert_eq!(tree.get(&k), Some(&k));
    }
}

#[test]
fn internal_deletes_use_predecessor_then_successor() {
    let mut tree = BTree::<i32, i32>::new(2);
    for k in [1, 2, 3, 4, 5, 0] {
        tree.insert(k, k);
    }
    // root is [2, 4] over leaves [0, 1], [3], [5]

    // the left leaf can spare an item, so 2 is replaced by its predecessor 1
    assert!(tree.erase_one(&2));
    tree.check_all_invariants();
    assert_eq!(tree.get(&1), Some(&1));
    assert_eq!(tree.get(&2), None);

    tree.insert(6, 6);
    // root is [1, 4] over leaves [0], [3], [5, 6]

    // now only the right leaf can spare one, so 4 yields to its successor 5
    assert!(tree.erase_one(&4));
    tree.check_all_invariants();
    assert_eq!(tree.get(&4), None);
    for k in [0, 1, 3, 5, 6] {
        assert_eq!(tree.get(&k), Some(&k));
    }
}

#[test]
fn delete_of_an_absent_key_is_a_no_op() {
    let mut tree = BTree::<i32, i32>::new(2);
    for k in 0..64 {
        tree.insert(k, k * 2);
    }
    let before = format!("{:?}", tree);

    assert!(!tree.erase_one(&1000));
    assert!(!tree.erase_one(&-3));

    tree.check_all_invariants();
    assert_eq!(format!("{:?}", tree), before);
    assert_eq!(tree.size(), 64);
}

#[test]
fn deleting_the_last_item_empties_the_tree() {
    let mut tree = BTree::<i32, i32>::new(3);
    tree.insert(7, 7);

    assert!(tree.erase_one(&7));
    tree.check_all_invariants();

    assert!(tree.empty());
    assert_eq!(tree.height(), 0);
    assert_eq!(tree.get(&7), None);
    assert!(!tree.erase_one(&7));
}

#[test]
fn ascending_and_descending_inserts() {
    for degree in 2..6 {
        let mut tree = BTree::<i32, i32>::new(degree);
        for k in 0..200 {
            tree.insert(k, k);
            tree.check_all_invariants();
        }
        for k in (-200..0).rev() {
            tree.insert(k, k);
            tree.check_all_invariants();
        }
        for k in -200..200 {
            assert_eq!(tree.get(&k), Some(&k));
        }
    }
}

#[test]
fn empty_tree_reports_absence() {
    let mut tree = BTree::<i32, i32>::new(5);
    assert_eq!(tree.get(&1), None);
    assert!(!tree.exists(&1));
    assert!(!tree.erase_one(&1));
    assert!(tree.empty());
    assert_eq!(tree.height(), 0);
    tree.check_all_invariants();
}

#[test]
fn stats_track_items_and_nodes() {
    let mut tree = BTree::<i32, i32>::new(2);
    for k in 0..32 {
        tree.insert(k, k);
    }
    // the invariant walk recounts every node against the tracked stats
    tree.check_all_invariants();

    let stats = tree.get_stats();
    assert_eq!(stats.size, 32);
    assert!(stats.leaves >= 1);
    assert!(stats.inner_nodes >= 1);
    assert_eq!(stats.nodes(), stats.leaves + stats.inner_nodes);
    assert!(stats.avgfill_leaves(3) > 0.0);

    for k in 0..32 {
        assert!(tree.erase_one(&k));
    }
    assert_eq!(tree.get_stats().nodes(), 0);
}

fn key_value_pairs() -> impl Strategy<Value = Vec<(u16, u16)>> {
    prop::collection::vec((0u16..1024, 0u16..1024), 0..512)
}

proptest! {
    #[test]
    fn matches_std_btreemap(pairs in key_value_pairs(), degree in 2usize..8) {
        let mut tree = BTree::new(degree);
        let mut model = StdMap::new();

        for &(k, v) in &pairs {
            tree.insert(k, v);
            model.insert(k, v);
        }
        tree.check_all_invariants();
        prop_assert_eq!(tree.size(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(tree.get(k), Some(v));
        }

        for (k, _) in model {
            prop_assert!(tree.erase_one(&k));
            prop_assert!(!tree.erase_one(&k));
            tree.check_all_invariants();
        }
        prop_assert!(tree.empty());
    }
}
