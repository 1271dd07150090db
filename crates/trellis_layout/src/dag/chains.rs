// SPDX-License-Identifier: MIT OR Apache-2.0
//! Linear chain discovery and collapse state.
//!
//! A chain is a maximal run of at least two nodes, each with in-degree and
//! out-degree at most one and at least one edge, linked end to end. Chains
//! are vertex-disjoint and their id is derived from the ordered member ids,
//! so collapse state survives recomputation while membership is unchanged.

use crate::snapshot::GraphSnapshot;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use trellis_graph::EntityId;

/// One maximal chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// Derived id, `chain:<first>><second>>...` with integers written `#7`
    pub id: String,
    /// Member node ids, first to last
    pub members: Vec<EntityId>,
    /// Edges linking consecutive members
    pub edges: Vec<EntityId>,
}

impl Chain {
    fn new(members: Vec<EntityId>, edges: Vec<EntityId>) -> Self {
        let joined: Vec<String> = members.iter().map(chain_id_part).collect();
        Self {
            id: format!("chain:{}", joined.join(">")),
            members,
            edges,
        }
    }

    /// Stand-in node when collapsed: the first member
    pub fn representative(&self) -> &EntityId {
        &self.members[0]
    }
}

/// One member id inside a chain id.
///
/// Integers are written `#7`. Strings are written as-is with `\\`, `>` and a
/// leading `#` escaped by a backslash, so distinct member lists never share
/// an id.
fn chain_id_part(id: &EntityId) -> String {
    match id {
        EntityId::Int(value) => format!("#{value}"),
        EntityId::Str(text) => {
            let mut part = String::with_capacity(text.len());
            for (index, ch) in text.chars().enumerate() {
                if ch == '\\' || ch == '>' || (ch == '#' && index == 0) {
                    part.push('\\');
                }
                part.push(ch);
            }
            part
        }
    }
}

/// Chain metadata attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainAnnotation {
    /// Chain the node belongs to
    pub chain_id: Option<String>,
    /// Nodes currently drawn as this one (1 unless collapsed)
    pub member_count: usize,
    /// Every member of the chain (just the node when unchained)
    pub member_ids: Vec<EntityId>,
    /// Edges inside the chain
    pub member_edge_ids: Vec<EntityId>,
    /// Representative of the chain (the node itself when unchained)
    pub representative_id: EntityId,
    /// Whether the chain is collapsed
    pub is_collapsed: bool,
}

/// Find every chain in a snapshot, in node order
pub fn find_chains(snapshot: &GraphSnapshot) -> Vec<Chain> {
    let mut in_degree: HashMap<&EntityId, usize> = HashMap::new();
    let mut out_degree: HashMap<&EntityId, usize> = HashMap::new();
    let mut next: HashMap<&EntityId, (&EntityId, &EntityId)> = HashMap::new();
    for edge in &snapshot.edges {
        *out_degree.entry(&edge.source).or_default() += 1;
        *in_degree.entry(&edge.target).or_default() += 1;
        next.insert(&edge.source, (&edge.target, &edge.id));
    }

    let eligible = |id: &EntityId| {
        let ins = in_degree.get(id).copied().unwrap_or(0);
        let outs = out_degree.get(id).copied().unwrap_or(0);
        ins <= 1 && outs <= 1 && ins + outs > 0
    };
    let mut previous: HashMap<&EntityId, &EntityId> = HashMap::new();
    for edge in &snapshot.edges {
        if eligible(&edge.source) && eligible(&edge.target) && edge.source != edge.target {
            previous.insert(&edge.target, &edge.source);
        }
    }

    let mut chains = Vec::new();
    let mut claimed: HashSet<&EntityId> = HashSet::new();
    for id in snapshot.nodes.keys() {
        // Runs start at eligible nodes without an eligible predecessor.
        if !eligible(id) || previous.contains_key(id) || claimed.contains(id) {
            continue;
        }
        let mut members = vec![id.clone()];
        let mut edges = Vec::new();
        claimed.insert(id);
        let mut current = id;
        while let Some(&(target, edge_id)) = next.get(current) {
            if !eligible(target) || claimed.contains(target) || target == current {
                break;
            }
            claimed.insert(target);
            members.push(target.clone());
            edges.push(edge_id.clone());
            current = target;
        }
        if members.len() >= 2 {
            chains.push(Chain::new(members, edges));
        }
    }
    chains
}

/// Chains of the current graph plus their collapse state
#[derive(Debug, Clone, Default)]
pub struct ChainSet {
    chains: Vec<Chain>,
    membership: HashMap<EntityId, usize>,
    collapsed: IndexMap<String, bool>,
}

impl ChainSet {
    /// Rediscover chains, keeping the state of chain ids seen before; new
    /// chains start at `default_collapsed`
    pub fn rebuild(&mut self, snapshot: &GraphSnapshot, default_collapsed: bool) {
        let chains = find_chains(snapshot);
        let collapsed = chains
            .iter()
            .map(|chain| {
                let state = self
                    .collapsed
                    .get(&chain.id)
                    .copied()
                    .unwrap_or(default_collapsed);
                (chain.id.clone(), state)
            })
            .collect();
        self.membership = chains
            .iter()
            .enumerate()
            .flat_map(|(index, chain)| chain.members.iter().map(move |id| (id.clone(), index)))
            .collect();
        self.chains = chains;
        self.collapsed = collapsed;
    }

    /// Set every chain to the same state
    pub fn reset(&mut self, collapsed: bool) {
        for state in self.collapsed.values_mut() {
            *state = collapsed;
        }
    }

    /// Discovered chains
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Chain containing `node`
    pub fn chain_of(&self, node: &EntityId) -> Option<&Chain> {
        self.membership.get(node).map(|&index| &self.chains[index])
    }

    /// Whether a chain is collapsed
    pub fn is_collapsed(&self, chain_id: &str) -> bool {
        self.collapsed.get(chain_id).copied().unwrap_or(false)
    }

    /// Flip one chain; returns the new state, or `None` for unknown ids
    pub fn toggle(&mut self, chain_id: &str) -> Option<bool> {
        let state = self.collapsed.get_mut(chain_id)?;
        *state = !*state;
        Some(*state)
    }

    /// Collapse exactly the listed chains and expand the others; unknown ids
    /// are ignored
    pub fn set_collapsed(&mut self, chain_ids: &[String]) {
        for (id, state) in self.collapsed.iter_mut() {
            *state = chain_ids.contains(id);
        }
    }

    /// Ids of collapsed chains, in discovery order
    pub fn collapsed_ids(&self) -> Vec<String> {
        self.collapsed
            .iter()
            .filter(|(_, collapsed)| **collapsed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Whether `node` is hidden behind its chain's representative
    pub fn should_skip(&self, node: &EntityId) -> bool {
        self.chain_of(node)
            .is_some_and(|chain| self.is_collapsed(&chain.id) && chain.representative() != node)
    }

    /// Node that `node` is drawn as
    pub fn map(&self, node: &EntityId) -> EntityId {
        match self.chain_of(node) {
            Some(chain) if self.is_collapsed(&chain.id) => chain.representative().clone(),
            _ => node.clone(),
        }
    }

    /// Chain metadata for `node`
    pub fn annotation(&self, node: &EntityId) -> ChainAnnotation {
        match self.chain_of(node) {
            Some(chain) => {
                let is_collapsed = self.is_collapsed(&chain.id);
                ChainAnnotation {
                    chain_id: Some(chain.id.clone()),
                    member_count: if is_collapsed { chain.members.len() } else { 1 },
                    member_ids: chain.members.clone(),
                    member_edge_ids: chain.edges.clone(),
                    representative_id: chain.representative().clone(),
                    is_collapsed,
                }
            }
            None => ChainAnnotation {
                chain_id: None,
                member_count: 1,
                member_ids: vec![node.clone()],
                member_edge_ids: Vec::new(),
                representative_id: node.clone(),
                is_collapsed: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::directed_graph;

    fn broken_chain() -> GraphSnapshot {
        let graph = directed_graph(
            &["A", "B", "C", "D", "E", "F"],
            &[
                ("ab", "A", "B"),
                ("bc", "B", "C"),
                ("cd", "C", "D"),
                ("de", "D", "E"),
                ("df", "D", "F"),
            ],
        );
        GraphSnapshot::capture(&graph, &[])
    }

    #[test]
    fn test_chain_breaks_at_branch() {
        let chains = find_chains(&broken_chain());
        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert_eq!(
            chain.members,
            vec![EntityId::from("A"), EntityId::from("B"), EntityId::from("C")]
        );
        assert_eq!(chain.edges, vec![EntityId::from("ab"), EntityId::from("bc")]);
        assert_eq!(chain.representative(), &EntityId::from("A"));
        assert_eq!(chain.id, "chain:A>B>C");
    }

    #[test]
    fn test_chain_ids_keep_members_apart() {
        let numeric = Chain::new(vec![EntityId::from(1), EntityId::from(2)], Vec::new());
        let text = Chain::new(vec![EntityId::from("1"), EntityId::from("2")], Vec::new());
        assert_eq!(numeric.id, "chain:#1>#2");
        assert_eq!(text.id, "chain:1>2");

        let split = Chain::new(vec![EntityId::from("a>b"), EntityId::from("c")], Vec::new());
        let joined = Chain::new(vec![EntityId::from("a"), EntityId::from("b>c")], Vec::new());
        assert_ne!(split.id, joined.id);
        assert_eq!(split.id, r"chain:a\>b>c");

        let hashed = Chain::new(vec![EntityId::from("#1"), EntityId::from("2")], Vec::new());
        assert_ne!(hashed.id, "chain:#1>2");
        let escaped = Chain::new(vec![EntityId::from(r"a\"), EntityId::from("b")], Vec::new());
        let plain = Chain::new(vec![EntityId::from("a"), EntityId::from(r"\b")], Vec::new());
        assert_ne!(escaped.id, plain.id);
    }

    #[test]
    fn test_numeric_and_text_chains_toggle_apart() {
        let mut graph = directed_graph(&["1", "2"], &[("s", "1", "2")]);
        graph.add_node(trellis_graph::Node::new(1));
        graph.add_node(trellis_graph::Node::new(2));
        graph.add_edge(trellis_graph::Edge::new("n", 1, 2).with_directed(true));
        let mut set = ChainSet::default();
        set.rebuild(&GraphSnapshot::capture(&graph, &[]), true);
        assert_eq!(set.chains().len(), 2);
        let text = set.chains()[0].id.clone();
        assert_ne!(text, set.chains()[1].id);

        assert_eq!(set.toggle(&text), Some(false));
        assert!(!set.should_skip(&"2".into()));
        assert!(set.should_skip(&EntityId::from(2)));
    }

    #[test]
    fn test_isolated_and_single_nodes_are_not_chains() {
        let graph = directed_graph(&["a", "b", "c"], &[("ab", "a", "b")]);
        let chains = find_chains(&GraphSnapshot::capture(&graph, &[]));
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].members.len(), 2);

        let graph = directed_graph(&["x", "y", "z"], &[("xz", "x", "z"), ("yz", "y", "z")]);
        assert!(find_chains(&GraphSnapshot::capture(&graph, &[])).is_empty());
    }

    #[test]
    fn test_toggle_round_trip_keeps_identity() {
        let snapshot = broken_chain();
        let mut set = ChainSet::default();
        set.rebuild(&snapshot, true);
        let id = set.chains()[0].id.clone();

        assert!(set.should_skip(&"B".into()));
        assert!(!set.should_skip(&"A".into()));
        assert!(!set.should_skip(&"D".into()));
        assert_eq!(set.map(&"C".into()), EntityId::from("A"));
        assert_eq!(set.annotation(&"B".into()).member_count, 3);

        assert_eq!(set.toggle(&id), Some(false));
        assert_eq!(set.map(&"C".into()), EntityId::from("C"));
        assert_eq!(set.annotation(&"B".into()).member_count, 1);
        assert_eq!(set.toggle(&id), Some(true));

        set.rebuild(&snapshot, false);
        assert_eq!(set.chains()[0].id, id);
        assert_eq!(set.chains()[0].representative(), &EntityId::from("A"));
        assert!(set.is_collapsed(&id));
    }

    #[test]
    fn test_annotation_for_unchained_node() {
        let mut set = ChainSet::default();
        set.rebuild(&broken_chain(), false);
        let annotation = set.annotation(&"D".into());
        assert_eq!(annotation.chain_id, None);
        assert_eq!(annotation.member_count, 1);
        assert_eq!(annotation.member_ids, vec![EntityId::from("D")]);
        assert_eq!(annotation.representative_id, EntityId::from("D"));
        assert!(!annotation.is_collapsed);

        set.set_collapsed(&["chain:A>B>C".to_string()]);
        assert_eq!(set.collapsed_ids(), vec!["chain:A>B>C".to_string()]);
        set.set_collapsed(&[]);
        assert!(set.collapsed_ids().is_empty());
    }
}
