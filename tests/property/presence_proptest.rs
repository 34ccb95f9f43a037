//! Property-based tests for the presence registry
//!
//! Random add/remove sequences are checked against a plain map of
//! connection -> trip.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use tripsync::backend::realtime::{PresenceRegistry, Transition};
use tripsync::shared::{ConnectionId, TripId, UserId};

const TRIPS: usize = 3;
const CONNECTIONS: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Add { conn: usize, trip: usize },
    Remove { conn: usize, trip: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..CONNECTIONS, 0..TRIPS).prop_map(|(conn, trip)| Op::Add { conn, trip }),
        (0..CONNECTIONS, 0..TRIPS).prop_map(|(conn, trip)| Op::Remove { conn, trip }),
    ]
}

fn trip(index: usize) -> TripId {
    TripId::new(format!("trip-{}", index))
}

/// Connections 0/3, 1/4 and 2/5 belong to the same user
fn user(conn: usize) -> UserId {
    UserId::new(format!("user-{}", conn % 3))
}

fn others_present(model: &HashMap<usize, usize>, conn: usize, trip_index: usize) -> bool {
    model
        .iter()
        .any(|(&other, &t)| other != conn && t == trip_index && other % 3 == conn % 3)
}

proptest! {
    #[test]
    fn test_registry_matches_model(ops in prop::collection::vec(op(), 1..60)) {
        let ids: Vec<ConnectionId> = (0..CONNECTIONS).map(|_| ConnectionId::new()).collect();
        let mut registry = PresenceRegistry::new();
        let mut model: HashMap<usize, usize> = HashMap::new();

        for op in ops {
            match op {
                Op::Add { conn, trip: t } => {
                    let result = registry.add(&trip(t), &user(conn), ids[conn]);
                    match model.get(&conn).copied() {
                        Some(current) if current == t => {
                            prop_assert_eq!(result, Ok(Transition::Unchanged));
                        }
                        Some(_) => prop_assert!(result.is_err()),
                        None => {
                            let expected = if others_present(&model, conn, t) {
                                Transition::Unchanged
                            } else {
                                Transition::Arrived
                            };
                            prop_assert_eq!(result, Ok(expected));
                            model.insert(conn, t);
                        }
                    }
                }
                Op::Remove { conn, trip: t } => {
                    let transition = registry.remove(&trip(t), &user(conn), ids[conn]);
                    if model.get(&conn) == Some(&t) {
                        model.remove(&conn);
                        let expected = if others_present(&model, conn, t) {
                            Transition::Unchanged
                        } else {
                            Transition::Departed
                        };
                        prop_assert_eq!(transition, expected);
                    } else {
                        prop_assert_eq!(transition, Transition::Unchanged);
                    }
                }
            }

            for t in 0..TRIPS {
                let expected: BTreeSet<UserId> = model
                    .iter()
                    .filter(|(_, room)| **room == t)
                    .map(|(&conn, _)| user(conn))
                    .collect();
                prop_assert_eq!(registry.members_of(&trip(t)), expected);
                prop_assert_eq!(
                    registry.connections_in(&trip(t)).count(),
                    model.values().filter(|&&room| room == t).count()
                );
            }
            for (conn, id) in ids.iter().enumerate() {
                let location = registry.location_of(*id).map(|(t, _)| t.clone());
                prop_assert_eq!(location, model.get(&conn).map(|&t| trip(t)));
            }
        }
    }

    #[test]
    fn test_removing_everything_empties_registry(
        placements in prop::collection::vec(0..TRIPS, CONNECTIONS)
    ) {
        let ids: Vec<ConnectionId> = (0..CONNECTIONS).map(|_| ConnectionId::new()).collect();
        let mut registry = PresenceRegistry::new();
        for (conn, &t) in placements.iter().enumerate() {
            prop_assert!(registry.add(&trip(t), &user(conn), ids[conn]).is_ok());
        }

        let mut departures = 0;
        for (conn, &t) in placements.iter().enumerate() {
            if registry.remove(&trip(t), &user(conn), ids[conn]) == Transition::Departed {
                departures += 1;
            }
        }

        let distinct: BTreeSet<(usize, usize)> = placements
            .iter()
            .enumerate()
            .map(|(conn, &t)| (conn % 3, t))
            .collect();
        prop_assert_eq!(departures, distinct.len());
        prop_assert_eq!(registry.active_trips(), 0);
    }
}
