//! Graph representation & indexers (component C1).
//!
//! [`Graph`] is a directed multigraph: nodes carry an opaque payload `N`,
//! edges are `(src, dst, key)` triples carrying an opaque arc payload `A`.
//! Node and edge indices are dense integers assigned on first insertion and
//! never reused — the same stability guarantee petgraph's own `NodeIndex`
//! and `EdgeIndex` give their `Graph<N, E, Ty, Ix>`.

use std::collections::HashMap;
use std::hash::Hash;

/// Index of a node in a [`Graph`]. Stable for the lifetime of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

/// Index of an edge in a [`Graph`]. Stable for the lifetime of the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeIndex(usize);

impl NodeIndex {
    pub fn new(i: usize) -> Self {
        NodeIndex(i)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl EdgeIndex {
    pub fn new(i: usize) -> Self {
        EdgeIndex(i)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// One edge's endpoints and disambiguating key, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeEndpoints {
    pub source: NodeIndex,
    pub target: NodeIndex,
    /// Disambiguates parallel edges between the same ordered pair of nodes.
    pub key: usize,
}

struct EdgeData<A> {
    endpoints: EdgeEndpoints,
    payload: A,
}

/// A directed multigraph with dense integer node and edge indices.
///
/// The graph owns its node and edge records; every algorithm in this crate
/// borrows it immutably. Construction fails (see [`crate::error::Error`])
/// if the model's arcs are not all directed and expanded — that invariant
/// is checked once, at construction, by [`Graph::try_from_arcs`].
pub struct Graph<N, A> {
    nodes: Vec<N>,
    edges: Vec<EdgeData<A>>,
    out_adj: Vec<Vec<EdgeIndex>>,
    in_adj: Vec<Vec<EdgeIndex>>,
}

impl<N, A> Graph<N, A> {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIndex> {
        (0..self.edges.len()).map(EdgeIndex)
    }

    pub fn node_weight(&self, n: NodeIndex) -> &N {
        &self.nodes[n.0]
    }

    pub fn edge_weight(&self, e: EdgeIndex) -> &A {
        &self.edges[e.0].payload
    }

    pub fn edge_endpoints(&self, e: EdgeIndex) -> EdgeEndpoints {
        self.edges[e.0].endpoints
    }

    pub fn out_edges(&self, n: NodeIndex) -> &[EdgeIndex] {
        &self.out_adj[n.0]
    }

    pub fn in_edges(&self, n: NodeIndex) -> &[EdgeIndex] {
        &self.in_adj[n.0]
    }

    /// Build a graph from an explicit node list and `(source, target, payload)`
    /// edge list. Nodes must already be deduplicated and indices dense;
    /// this is the low-level constructor used by [`Graph::try_from_arcs`]
    /// and directly by tests.
    pub fn from_parts(nodes: Vec<N>, raw_edges: Vec<(NodeIndex, NodeIndex, A)>) -> Self {
        let mut out_adj = vec![Vec::new(); nodes.len()];
        let mut in_adj = vec![Vec::new(); nodes.len()];
        let mut pair_count: HashMap<(usize, usize), usize> = HashMap::new();
        let mut edges = Vec::with_capacity(raw_edges.len());

        for (source, target, payload) in raw_edges {
            let key = {
                let counter = pair_count.entry((source.0, target.0)).or_insert(0);
                let k = *counter;
                *counter += 1;
                k
            };
            let edge_idx = EdgeIndex(edges.len());
            edges.push(EdgeData {
                endpoints: EdgeEndpoints {
                    source,
                    target,
                    key,
                },
                payload,
            });
            out_adj[source.0].push(edge_idx);
            in_adj[target.0].push(edge_idx);
        }

        Graph {
            nodes,
            edges,
            out_adj,
            in_adj,
        }
    }
}

impl<N, A> Graph<N, A>
where
    N: Clone + Eq + Hash,
{
    /// Build a graph whose node set is exactly the set of endpoints of
    /// `arcs`, interning node identities as they are first seen. This is
    /// the graph-construction half of the §6 "Graph construction from
    /// model" interface; the directed/expanded validity checks live at the
    /// call site in [`crate::model`], since they require inspecting fields
    /// this module has no knowledge of.
    pub fn try_from_arcs<I>(arcs: I) -> Self
    where
        I: IntoIterator<Item = (N, N, A)>,
    {
        let mut node_index: HashMap<N, NodeIndex> = HashMap::new();
        let mut nodes = Vec::new();
        let mut raw_edges = Vec::new();

        let mut intern = |n: &N, nodes: &mut Vec<N>, node_index: &mut HashMap<N, NodeIndex>| -> NodeIndex {
            if let Some(&idx) = node_index.get(n) {
                idx
            } else {
                let idx = NodeIndex(nodes.len());
                nodes.push(n.clone());
                node_index.insert(n.clone(), idx);
                idx
            }
        };

        for (src, dst, payload) in arcs {
            let s = intern(&src, &mut nodes, &mut node_index);
            let t = intern(&dst, &mut nodes, &mut node_index);
            raw_edges.push((s, t, payload));
        }

        Graph::from_parts(nodes, raw_edges)
    }
}

/// One entry of a [`Adjacency`] list: a neighbor together with the edge
/// that reaches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighbor {
    /// Index into the *local* node space of the enclosing [`Adjacency`]
    /// (equal to the graph's own [`NodeIndex`] space when no node subset
    /// was supplied).
    pub local: usize,
    pub edge: EdgeIndex,
}

/// A filtered adjacency view: successor and predecessor lists restricted to
/// an (optional) node subset and with a set of excluded edges removed.
///
/// Built by [`filtered_adjacency`]. Local indices `0..index_to_node.len()`
/// correspond 1:1 with `index_to_node`, letting the same representation
/// serve both whole-graph queries (C2) and per-SCC subgraph queries (C4).
pub struct Adjacency {
    pub index_to_node: Vec<NodeIndex>,
    pub successors: Vec<Vec<Neighbor>>,
    pub predecessors: Vec<Vec<Neighbor>>,
}

impl Adjacency {
    pub fn local_of(&self, n: NodeIndex) -> Option<usize> {
        self.index_to_node.iter().position(|&x| x == n)
    }
}

/// Build a filtered adjacency view of `g`.
///
/// `exclude_edges` is removed from consideration entirely (this is how the
/// driver evaluates "the graph minus the tear set"). `nodes`, if given,
/// restricts the induced subgraph to exactly that node set (used to confine
/// C4's ordering to a single SCC). `multi` controls whether parallel edges
/// between the same ordered pair collapse to one adjacency entry (`false`)
/// or are preserved one-per-edge (`true`).
pub fn filtered_adjacency<N, A>(
    g: &Graph<N, A>,
    exclude_edges: &std::collections::HashSet<EdgeIndex>,
    nodes: Option<&[NodeIndex]>,
    multi: bool,
) -> Adjacency {
    let index_to_node: Vec<NodeIndex> = match nodes {
        Some(ns) => ns.to_vec(),
        None => g.node_indices().collect(),
    };
    let included: std::collections::HashSet<NodeIndex> = index_to_node.iter().copied().collect();

    let mut local_of: HashMap<NodeIndex, usize> = HashMap::new();
    for (i, &n) in index_to_node.iter().enumerate() {
        local_of.insert(n, i);
    }

    let mut successors = vec![Vec::new(); index_to_node.len()];
    let mut predecessors = vec![Vec::new(); index_to_node.len()];

    for (i, &n) in index_to_node.iter().enumerate() {
        let mut seen_succ = std::collections::HashSet::new();
        for &e in g.out_edges(n) {
            if exclude_edges.contains(&e) {
                continue;
            }
            let target = g.edge_endpoints(e).target;
            if !included.contains(&target) {
                continue;
            }
            if !multi && !seen_succ.insert(target) {
                continue;
            }
            let local_target = local_of[&target];
            successors[i].push(Neighbor {
                local: local_target,
                edge: e,
            });
        }

        let mut seen_pred = std::collections::HashSet::new();
        for &e in g.in_edges(n) {
            if exclude_edges.contains(&e) {
                continue;
            }
            let source = g.edge_endpoints(e).source;
            if !included.contains(&source) {
                continue;
            }
            if !multi && !seen_pred.insert(source) {
                continue;
            }
            let local_source = local_of[&source];
            predecessors[i].push(Neighbor {
                local: local_source,
                edge: e,
            });
        }
    }

    Adjacency {
        index_to_node,
        successors,
        predecessors,
    }
}
