//! Max-flow / min-cut by growing search trees from both terminals.
//!
//! This is the Boykov-Kolmogorov augmenting-path scheme: a SOURCE tree and
//! a SINK tree grow over non-saturated arcs until they touch, flow is pushed
//! along the joined path, and nodes cut off by saturated arcs are adopted
//! back into their tree or set free. The trees are reused between
//! augmentations instead of being rebuilt by a fresh search each time.
//!
//! All solver state lives in arrays indexed by node or arc id. Arcs come in
//! sister pairs `2k` / `2k + 1`, one pair per `NeighborEdge`, so the reverse
//! of arc `a` is `a ^ 1`.

use super::graph::FlowNetwork;
use super::types::CancellationToken;
use crate::error::{Result, SegmentationError};
use std::collections::VecDeque;

/// Link from a node to its parent in a search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    /// Not in any tree
    Free,
    /// Attached directly to its tree's terminal
    Terminal,
    /// Lost its parent during the current augmentation
    Orphan,
    /// Arc from this node to its parent
    Arc(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tree {
    Source,
    Sink,
}

#[derive(Debug, Clone, Copy)]
struct ResidualArc {
    head: usize,
    r_cap: f64,
}

/// Counters collected during one solve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub augmentations: usize,
    pub adoptions: usize,
}

/// Result of a max-flow computation
#[derive(Debug, Clone, PartialEq)]
pub struct MinCut {
    flow: f64,
    source_side: Vec<bool>,
    stats: SolverStats,
}

impl MinCut {
    /// Total flow pushed, equal to the capacity of the cut
    pub fn flow(&self) -> f64 {
        self.flow
    }

    /// Whether `node` is still reachable from SOURCE in the residual graph
    pub fn is_source_side(&self, node: usize) -> bool {
        self.source_side[node]
    }

    pub fn source_side(&self) -> &[bool] {
        &self.source_side
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }
}

/// Residual state for one solve of a `FlowNetwork`
///
/// The network itself is never modified, so solving it again starts from
/// scratch and produces the same cut.
pub struct MinCutSolver {
    arcs: Vec<ResidualArc>,
    /// `out_arcs[first_arc[v]..first_arc[v + 1]]` leave node `v`
    first_arc: Vec<usize>,
    out_arcs: Vec<usize>,
    tr_cap: Vec<f64>,
    parent: Vec<Parent>,
    tree: Vec<Tree>,
    timestamp: Vec<u64>,
    dist: Vec<u64>,
    queued: Vec<bool>,
    active: VecDeque<usize>,
    orphans: VecDeque<usize>,
    /// Node whose arcs are still being scanned after an augmentation
    current: Option<usize>,
    time: u64,
    flow: f64,
    stats: SolverStats,
    cancel: Option<CancellationToken>,
}

impl MinCutSolver {
    pub fn new(network: &FlowNetwork) -> Self {
        let node_count = network.node_count();
        let edges = network.edges();

        let mut arcs = Vec::with_capacity(2 * edges.len());
        let mut degree = vec![0usize; node_count + 1];
        for edge in edges {
            arcs.push(ResidualArc {
                head: edge.to,
                r_cap: edge.capacity,
            });
            arcs.push(ResidualArc {
                head: edge.from,
                r_cap: edge.reverse_capacity,
            });
            degree[edge.from] += 1;
            degree[edge.to] += 1;
        }

        // Prefix sums give each node a contiguous slice of arc ids, filled
        // in edge creation order.
        let mut first_arc = vec![0usize; node_count + 1];
        for v in 0..node_count {
            first_arc[v + 1] = first_arc[v] + degree[v];
        }
        let mut fill = first_arc.clone();
        let mut out_arcs = vec![0usize; 2 * edges.len()];
        for (k, edge) in edges.iter().enumerate() {
            out_arcs[fill[edge.from]] = 2 * k;
            fill[edge.from] += 1;
            out_arcs[fill[edge.to]] = 2 * k + 1;
            fill[edge.to] += 1;
        }

        let mut solver = Self {
            arcs,
            first_arc,
            out_arcs,
            tr_cap: vec![0.0; node_count],
            parent: vec![Parent::Free; node_count],
            tree: vec![Tree::Source; node_count],
            timestamp: vec![0; node_count],
            dist: vec![0; node_count],
            queued: vec![false; node_count],
            active: VecDeque::new(),
            orphans: VecDeque::new(),
            current: None,
            time: 0,
            flow: 0.0,
            stats: SolverStats::default(),
            cancel: None,
        };

        for v in 0..node_count {
            let source = network.source_capacity(v);
            let sink = network.sink_capacity(v);
            // Flow through SOURCE -> v -> SINK is pushed up front, leaving a
            // single signed terminal residual per node.
            solver.flow += source.min(sink);
            solver.tr_cap[v] = source - sink;

            if solver.tr_cap[v] > 0.0 {
                solver.attach_to_terminal(v, Tree::Source);
            } else if solver.tr_cap[v] < 0.0 {
                solver.attach_to_terminal(v, Tree::Sink);
            }
        }

        solver
    }

    /// Check `token` between growth steps and stop when it is set
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn attach_to_terminal(&mut self, v: usize, tree: Tree) {
        self.tree[v] = tree;
        self.parent[v] = Parent::Terminal;
        self.timestamp[v] = self.time;
        self.dist[v] = 1;
        self.set_active(v);
    }

    fn set_active(&mut self, v: usize) {
        if !self.queued[v] {
            self.queued[v] = true;
            self.active.push_back(v);
        }
    }

    fn next_active(&mut self) -> Option<usize> {
        while let Some(v) = self.active.pop_front() {
            self.queued[v] = false;
            if self.parent[v] != Parent::Free {
                return Some(v);
            }
        }
        None
    }

    fn set_orphan_front(&mut self, v: usize) {
        self.parent[v] = Parent::Orphan;
        self.orphans.push_front(v);
    }

    fn set_orphan_rear(&mut self, v: usize) {
        self.parent[v] = Parent::Orphan;
        self.orphans.push_back(v);
    }

    /// Residual capacity in the direction flow travels inside `tree`:
    /// toward the leaves for SOURCE, toward the root for SINK
    fn tree_residual(&self, tree: Tree, arc: usize) -> f64 {
        match tree {
            Tree::Source => self.arcs[arc ^ 1].r_cap,
            Tree::Sink => self.arcs[arc].r_cap,
        }
    }

    /// Grow from one active node, augmenting if the trees touch
    ///
    /// Returns `false` once no active node is left.
    fn step(&mut self) -> Result<bool> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            tracing::debug!(
                "Max-flow cancelled after {} augmentations",
                self.stats.augmentations
            );
            return Err(SegmentationError::Cancelled);
        }

        let node = match self.current.take().filter(|&v| self.parent[v] != Parent::Free) {
            Some(v) => v,
            None => match self.next_active() {
                Some(v) => v,
                None => return Ok(false),
            },
        };

        if let Some(bridge) = self.grow(node) {
            self.augment(bridge);
            self.adopt_orphans();
            // the node may still have unexplored arcs
            self.current = Some(node);
        }
        Ok(true)
    }

    /// Run to completion and report the minimum cut
    pub fn solve(mut self) -> Result<MinCut> {
        let _span = tracing::debug_span!("max_flow").entered();

        while self.step()? {}

        tracing::debug!(
            "Max-flow {:.6} after {} augmentations, {} adoptions",
            self.flow,
            self.stats.augmentations,
            self.stats.adoptions
        );

        Ok(MinCut {
            flow: self.flow,
            source_side: self.source_reachable(),
            stats: self.stats,
        })
    }

    /// Expand the tree containing `v` across its arcs; returns the arc that
    /// leads from the SOURCE tree into the SINK tree, if one was found
    fn grow(&mut self, v: usize) -> Option<usize> {
        let tree = self.tree[v];
        for k in self.first_arc[v]..self.first_arc[v + 1] {
            let arc = self.out_arcs[k];
            // arc leaves v; flow must be able to travel away from the root
            let residual = match tree {
                Tree::Source => self.arcs[arc].r_cap,
                Tree::Sink => self.arcs[arc ^ 1].r_cap,
            };
            if residual <= 0.0 {
                continue;
            }

            let w = self.arcs[arc].head;
            if self.parent[w] == Parent::Free {
                self.tree[w] = tree;
                self.parent[w] = Parent::Arc(arc ^ 1);
                self.timestamp[w] = self.timestamp[v];
                self.dist[w] = self.dist[v] + 1;
                self.set_active(w);
            } else if self.tree[w] != tree {
                return Some(match tree {
                    Tree::Source => arc,
                    Tree::Sink => arc ^ 1,
                });
            } else if self.timestamp[w] <= self.timestamp[v] && self.dist[w] > self.dist[v] {
                // v offers w a shorter route to the root
                self.parent[w] = Parent::Arc(arc ^ 1);
                self.timestamp[w] = self.timestamp[v];
                self.dist[w] = self.dist[v] + 1;
            }
        }
        None
    }

    /// Push the bottleneck along SOURCE ~> tail(bridge) -> head(bridge) ~> SINK
    fn augment(&mut self, bridge: usize) {
        let tail = self.arcs[bridge ^ 1].head;
        let head = self.arcs[bridge].head;

        let mut bottleneck = self.arcs[bridge].r_cap;
        let mut v = tail;
        while let Parent::Arc(arc) = self.parent[v] {
            bottleneck = bottleneck.min(self.arcs[arc ^ 1].r_cap);
            v = self.arcs[arc].head;
        }
        bottleneck = bottleneck.min(self.tr_cap[v]);

        v = head;
        while let Parent::Arc(arc) = self.parent[v] {
            bottleneck = bottleneck.min(self.arcs[arc].r_cap);
            v = self.arcs[arc].head;
        }
        bottleneck = bottleneck.min(-self.tr_cap[v]);

        self.arcs[bridge].r_cap -= bottleneck;
        self.arcs[bridge ^ 1].r_cap += bottleneck;

        v = tail;
        while let Parent::Arc(arc) = self.parent[v] {
            let next = self.arcs[arc].head;
            self.arcs[arc].r_cap += bottleneck;
            self.arcs[arc ^ 1].r_cap -= bottleneck;
            if self.arcs[arc ^ 1].r_cap <= 0.0 {
                self.set_orphan_front(v);
            }
            v = next;
        }
        self.tr_cap[v] -= bottleneck;
        if self.tr_cap[v] <= 0.0 {
            self.set_orphan_front(v);
        }

        v = head;
        while let Parent::Arc(arc) = self.parent[v] {
            let next = self.arcs[arc].head;
            self.arcs[arc ^ 1].r_cap += bottleneck;
            self.arcs[arc].r_cap -= bottleneck;
            if self.arcs[arc].r_cap <= 0.0 {
                self.set_orphan_front(v);
            }
            v = next;
        }
        self.tr_cap[v] += bottleneck;
        if self.tr_cap[v] >= 0.0 {
            self.set_orphan_front(v);
        }

        self.flow += bottleneck;
        self.stats.augmentations += 1;
    }

    fn adopt_orphans(&mut self) {
        self.time += 1;
        while let Some(v) = self.orphans.pop_front() {
            self.stats.adoptions += 1;
            self.process_orphan(v);
        }
    }

    /// Find `v` a new parent in its own tree whose path to the terminal is
    /// intact, preferring the shortest; otherwise free `v` and orphan its
    /// children
    fn process_orphan(&mut self, v: usize) {
        let tree = self.tree[v];
        let mut best: Option<(usize, u64)> = None;

        for k in self.first_arc[v]..self.first_arc[v + 1] {
            let arc = self.out_arcs[k];
            if self.tree_residual(tree, arc) <= 0.0 {
                continue;
            }
            let w = self.arcs[arc].head;
            if self.parent[w] == Parent::Free || self.tree[w] != tree {
                continue;
            }

            let Some(depth) = self.depth_to_terminal(w) else {
                continue;
            };
            if best.map_or(true, |(_, d)| depth < d) {
                best = Some((arc, depth));
            }

            // cache the distances just measured along w's path
            let mut d = depth;
            let mut u = w;
            while self.timestamp[u] != self.time {
                self.timestamp[u] = self.time;
                self.dist[u] = d;
                d = d.saturating_sub(1);
                match self.parent[u] {
                    Parent::Arc(a) => u = self.arcs[a].head,
                    _ => break,
                }
            }
        }

        if let Some((arc, depth)) = best {
            self.parent[v] = Parent::Arc(arc);
            self.timestamp[v] = self.time;
            self.dist[v] = depth + 1;
            return;
        }

        self.parent[v] = Parent::Free;
        for k in self.first_arc[v]..self.first_arc[v + 1] {
            let arc = self.out_arcs[k];
            let w = self.arcs[arc].head;
            if self.parent[w] == Parent::Free || self.tree[w] != tree {
                continue;
            }
            if self.tree_residual(tree, arc) > 0.0 {
                self.set_active(w);
            }
            if let Parent::Arc(a) = self.parent[w] {
                if self.arcs[a].head == v {
                    self.set_orphan_rear(w);
                }
            }
        }
    }

    /// Number of nodes from `w` up to its terminal, or `None` when the walk
    /// runs into an orphan
    fn depth_to_terminal(&mut self, w: usize) -> Option<u64> {
        let mut depth = 0u64;
        let mut u = w;
        loop {
            if self.timestamp[u] == self.time {
                return Some(depth + self.dist[u]);
            }
            depth += 1;
            match self.parent[u] {
                Parent::Terminal => {
                    self.timestamp[u] = self.time;
                    self.dist[u] = 1;
                    return Some(depth);
                }
                Parent::Arc(a) => u = self.arcs[a].head,
                Parent::Orphan | Parent::Free => return None,
            }
        }
    }

    /// Nodes reachable from SOURCE over arcs with residual capacity left
    fn source_reachable(&self) -> Vec<bool> {
        let node_count = self.tr_cap.len();
        let mut reached = vec![false; node_count];
        let mut queue = VecDeque::new();
        for v in 0..node_count {
            if self.tr_cap[v] > 0.0 {
                reached[v] = true;
                queue.push_back(v);
            }
        }
        while let Some(v) = queue.pop_front() {
            for k in self.first_arc[v]..self.first_arc[v + 1] {
                let arc = self.out_arcs[k];
                let w = self.arcs[arc].head;
                if !reached[w] && self.arcs[arc].r_cap > 0.0 {
                    reached[w] = true;
                    queue.push_back(w);
                }
            }
        }
        reached
    }
}
