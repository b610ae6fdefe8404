use std::collections::{BTreeMap, VecDeque};

/// A directed graph of router nodes, stored as each node's predecessor
/// list: `predecessors(v)` are the nodes whose announcements `v` hears.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    preds: BTreeMap<String, Vec<String>>,
}

impl Topology {
    /// Build from a predecessor map. A node mentioned only as someone
    /// else's predecessor is added with no predecessors of its own.
    pub fn new(preds: BTreeMap<String, Vec<String>>) -> Topology {
        let mut preds = preds;
        let mentioned: Vec<String> = preds
            .values()
            .flatten()
            .filter(|u| !preds.contains_key(*u))
            .cloned()
            .collect();
        for u in mentioned {
            preds.entry(u).or_default();
        }
        Topology { preds }
    }

    /// A single isolated node.
    pub fn single(name: impl Into<String>) -> Topology {
        let mut preds = BTreeMap::new();
        preds.insert(name.into(), Vec::new());
        Topology { preds }
    }

    /// A bidirectional path `n0 - n1 - ... - n{k-1}`.
    pub fn path(k: usize) -> Topology {
        let name = |i: usize| format!("n{i}");
        let mut preds = BTreeMap::new();
        for i in 0..k {
            let mut around = Vec::new();
            if i > 0 {
                around.push(name(i - 1));
            }
            if i + 1 < k {
                around.push(name(i + 1));
            }
            preds.insert(name(i), around);
        }
        Topology { preds }
    }

    /// A complete bidirectional graph on `k` nodes.
    pub fn complete(k: usize) -> Topology {
        let name = |i: usize| format!("n{i}");
        let mut preds = BTreeMap::new();
        for i in 0..k {
            preds.insert(name(i), (0..k).filter(|j| *j != i).map(name).collect());
        }
        Topology { preds }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.preds.contains_key(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.preds.keys().map(String::as_str)
    }

    pub fn n_nodes(&self) -> usize {
        self.preds.len()
    }

    pub fn predecessors(&self, node: &str) -> &[String] {
        self.preds.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Directed edges `(u, v)` with `u` a predecessor of `v`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.preds
            .iter()
            .flat_map(|(v, us)| us.iter().map(move |u| (u.as_str(), v.as_str())))
    }

    pub fn n_edges(&self) -> usize {
        self.preds.values().map(Vec::len).sum()
    }

    /// Map every node to a value.
    pub fn for_all_nodes<T>(&self, mut f: impl FnMut(&str) -> T) -> BTreeMap<String, T> {
        self.nodes().map(|v| (v.to_string(), f(v))).collect()
    }

    /// Map every directed edge to a value.
    pub fn for_all_edges<T>(
        &self,
        mut f: impl FnMut(&str, &str) -> T,
    ) -> BTreeMap<(String, String), T> {
        self.edges()
            .map(|(u, v)| ((u.to_string(), v.to_string()), f(u, v)))
            .collect()
    }

    pub fn fold_nodes<A>(&self, init: A, mut f: impl FnMut(A, &str) -> A) -> A {
        self.nodes().fold(init, |acc, v| f(acc, v))
    }

    /// Hop distance from `source` to every reachable node, following edges
    /// forward. The source itself is at distance zero.
    pub fn breadth_first_distances(&self, source: &str) -> BTreeMap<String, i64> {
        let mut dist = BTreeMap::new();
        if !self.contains(source) {
            return dist;
        }
        dist.insert(source.to_string(), 0i64);
        let mut queue = VecDeque::from([source.to_string()]);
        while let Some(u) = queue.pop_front() {
            let d = dist[&u];
            let next: Vec<String> = self
                .preds
                .iter()
                .filter(|(_, us)| us.contains(&u))
                .map(|(v, _)| v.clone())
                .collect();
            for v in next {
                if !dist.contains_key(&v) {
                    dist.insert(v.clone(), d + 1);
                    queue.push_back(v);
                }
            }
        }
        dist
    }
}
