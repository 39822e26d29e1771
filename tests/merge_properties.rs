// tests/merge_properties.rs
use feed_harvester::merge::{find_duplicate_ids, merge_descending, validate_sequence};
use feed_harvester::Message;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Newest-first run of messages for the given ids (sorted + deduped here).
fn seq(ids: &[i64]) -> Vec<Message> {
    let mut ids = ids.to_vec();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
    ids.into_iter()
        .map(|id| Message::new(id, "2021-03-04 10:00", format!("m{id}")))
        .collect()
}

fn ids(v: &[Message]) -> Vec<i64> {
    v.iter().map(|m| m.id).collect()
}

/// Seeded batch so the cases cover overlaps, gaps and ties.
fn cases() -> Vec<(Vec<Message>, Vec<Message>)> {
    let mut rng = StdRng::seed_from_u64(0x2545_F491);
    (0..200)
        .map(|_| {
            let a: Vec<i64> = (0..rng.random_range(0..25))
                .map(|_| rng.random_range(0..120))
                .collect();
            let b: Vec<i64> = (0..rng.random_range(0..17))
                .map(|_| rng.random_range(0..120))
                .collect();
            (seq(&a), seq(&b))
        })
        .collect()
}

#[test]
fn merge_with_itself_is_unchanged() {
    for (a, _) in cases() {
        assert_eq!(merge_descending(&a, &a), a);
    }
}

#[test]
fn disjoint_newer_page_goes_in_front() {
    let source = seq(&[40, 33, 31, 12]);
    let incoming = seq(&[90, 77, 41]);
    let merged = merge_descending(&source, &incoming);
    assert_eq!(merged, [incoming.clone(), source.clone()].concat());
}

#[test]
fn output_is_strictly_descending_without_duplicates() {
    for (a, b) in cases() {
        let merged = merge_descending(&a, &b);
        assert!(validate_sequence(&merged).is_ok(), "{:?}", ids(&merged));
        assert!(find_duplicate_ids(&merged).is_empty());

        let mut expected: Vec<i64> = ids(&a).into_iter().chain(ids(&b)).collect();
        expected.sort_unstable_by(|x, y| y.cmp(x));
        expected.dedup();
        assert_eq!(ids(&merged), expected);
    }
}

#[test]
fn source_entry_wins_on_tie() {
    let source = vec![Message::new(5, "2021-03-04 10:00", "stored")];
    let incoming = vec![
        Message::new(6, "2021-03-04 10:01", "new"),
        Message::new(5, "2021-03-04 10:00", "refetched"),
    ];
    let merged = merge_descending(&source, &incoming);
    assert_eq!(merged[1].body, "stored");
}
