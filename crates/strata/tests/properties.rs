//! Property-based tests for the query engine.
//!
//! Invariants that hold for any graph shape:
//! - Direct neighbours are symmetric between the two walk directions
//! - Closures contain the direct set and never the origin
//! - Closures are transitively closed
//! - Every reported path follows real edges
//! - Estate-wide cycle members have cycles through them

use std::collections::BTreeSet;

use proptest::prelude::*;
use strata::{
    DependencyGraph, Edge, GraphIndex, GraphMetadata, GraphQueries, Node, NodeDetail, NodeId,
    NodeType, PathLimits, Relation,
};

fn table_id(n: usize) -> NodeId {
    NodeId::new(NodeType::DbTable, &format!("T{n}"))
}

fn graph_of(size: usize, links: &[(usize, usize)]) -> DependencyGraph {
    let nodes = (0..size)
        .map(|n| Node::new(format!("T{n}"), NodeDetail::DbTable))
        .collect();
    let edges = links
        .iter()
        .map(|&(a, b)| Edge::new(table_id(a % size), table_id(b % size), Relation::Contains))
        .collect();
    DependencyGraph::from_parts(nodes, edges, GraphMetadata::default())
}

fn arb_graph(max_nodes: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1..=max_nodes).prop_flat_map(|size| {
        (
            Just(size),
            prop::collection::vec((0..size, 0..size), 0..size * 3),
        )
    })
}

proptest! {
    #[test]
    fn direct_neighbours_are_symmetric((size, links) in arb_graph(10)) {
        let index = GraphIndex::new(graph_of(size, &links));

        for a in 0..size {
            let dependents = index.dependents(&table_id(a), false).unwrap();
            for b in 0..size {
                let dependencies = index.dependencies(&table_id(b), false).unwrap();
                prop_assert_eq!(
                    dependents.contains(&table_id(b)),
                    dependencies.contains(&table_id(a))
                );
            }
        }
    }

    #[test]
    fn closures_contain_direct_sets_and_exclude_origin((size, links) in arb_graph(10)) {
        let index = GraphIndex::new(graph_of(size, &links));

        for n in 0..size {
            let origin = table_id(n);
            for recursive_then_direct in [
                (index.dependents(&origin, true).unwrap(), index.dependents(&origin, false).unwrap()),
                (index.dependencies(&origin, true).unwrap(), index.dependencies(&origin, false).unwrap()),
            ] {
                let (all, direct) = recursive_then_direct;
                prop_assert!(direct.is_subset(&all));
                prop_assert!(!all.contains(&origin));
            }
        }
    }

    #[test]
    fn dependent_closures_are_transitive((size, links) in arb_graph(8)) {
        let index = GraphIndex::new(graph_of(size, &links));

        for n in 0..size {
            let origin = table_id(n);
            let mut reach = index.dependents(&origin, true).unwrap();
            for reached in reach.clone() {
                let further = index.dependents(&reached, true).unwrap();
                let mut allowed: BTreeSet<NodeId> = reach.clone();
                allowed.insert(origin.clone());
                prop_assert!(further.is_subset(&allowed));
            }
            reach.insert(origin.clone());
            prop_assert!(reach.len() <= size);
        }
    }

    #[test]
    fn paths_follow_edges_within_the_hop_limit(
        (size, links) in arb_graph(6),
        max_hops in 1usize..6,
    ) {
        let graph = graph_of(size, &links);
        let edges: BTreeSet<(NodeId, NodeId)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();
        let index = GraphIndex::new(graph);
        let limits = PathLimits { max_hops, ..PathLimits::default() };

        for from in 0..size {
            for to in 0..size {
                let search = index.find_paths_bounded(&table_id(from), &table_id(to), limits);
                for path in &search.paths {
                    prop_assert!(path.len() >= 2);
                    prop_assert!(path.len() - 1 <= max_hops);
                    prop_assert_eq!(path.first(), Some(&table_id(from)));
                    prop_assert_eq!(path.last(), Some(&table_id(to)));
                    for step in path.windows(2) {
                        prop_assert!(edges.contains(&(step[0].clone(), step[1].clone())));
                    }
                    // Interior nodes are never revisited.
                    let interior: BTreeSet<&NodeId> = path[..path.len() - 1].iter().collect();
                    prop_assert_eq!(interior.len(), path.len() - 1);
                }
            }
        }
    }

    #[test]
    fn cycle_members_have_cycles_through_them((size, links) in arb_graph(7)) {
        let index = GraphIndex::new(graph_of(size, &links));

        for component in index.detect_cycles() {
            for member in &component {
                let cycles = index.find_cycles(member).unwrap();
                prop_assert!(!cycles.is_empty(), "no cycle through {}", member);
            }
        }
    }

    #[test]
    fn fingerprint_ignores_edge_order((size, links) in arb_graph(10)) {
        let forward = graph_of(size, &links);
        let reversed: Vec<(usize, usize)> = links.iter().rev().copied().collect();
        let backward = graph_of(size, &reversed);

        prop_assert_eq!(&forward.metadata.fingerprint, &backward.metadata.fingerprint);
        prop_assert_eq!(forward.node_count(), size);
    }
}
