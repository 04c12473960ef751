// Property tests for the session store: whatever interleaving of inserts and
// deletes is applied, the listing is exactly the surviving records in
// descending date order.

use pitwall::storage::{Database, Session};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert { date_s: f64 },
    // Index into the ids assigned so far; deleting an already-deleted or
    // never-assigned id must be a no-op.
    DeleteNth(usize),
    DeleteUnknown,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u32..100_000).prop_map(|d| Op::Insert { date_s: d as f64 }),
        1 => (0usize..64).prop_map(Op::DeleteNth),
        1 => Just(Op::DeleteUnknown),
    ]
}

fn session(date_s: f64) -> Session {
    Session {
        id: None,
        date_s,
        stats: format!("session at {date_s}"),
        latitude: None,
        longitude: None,
        lap_count: None,
        best_lap_time_s: None,
        total_time_s: None,
    }
}

proptest! {
    #[test]
    fn listing_matches_surviving_inserts_in_descending_order(
        ops in proptest::collection::vec(op_strategy(), 0..40)
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut assigned: Vec<i64> = Vec::new();
        let mut alive: Vec<(i64, f64)> = Vec::new();

        for op in ops {
            match op {
                Op::Insert { date_s } => {
                    let id = db.insert_session(&session(date_s)).unwrap();
                    // Identity is unique and monotonically increasing.
                    if let Some(last) = assigned.last() {
                        prop_assert!(id > *last);
                    }
                    assigned.push(id);
                    alive.push((id, date_s));
                }
                Op::DeleteNth(n) => {
                    if let Some(id) = assigned.get(n).copied() {
                        db.delete_session(id).unwrap();
                        alive.retain(|(alive_id, _)| *alive_id != id);
                    }
                }
                Op::DeleteUnknown => {
                    db.delete_session(i64::MAX).unwrap();
                }
            }

            let listed = db.list_sessions().unwrap();
            prop_assert_eq!(listed.len(), alive.len());

            // Deleted ids never reappear.
            for s in &listed {
                prop_assert!(alive.iter().any(|(id, _)| Some(*id) == s.id));
            }

            // Descending by date.
            for pair in listed.windows(2) {
                prop_assert!(pair[0].date_s >= pair[1].date_s);
            }
        }
    }
}
