//! Graph of factors linked by shared motifs, used to borrow a model from a
//! related factor when a factor has none of its own.

use std::collections::HashMap;

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::debug;

use crate::data_handling::motif2factors::FactorMotifs;

/// Undirected graph over factor names. The edge weight between two factors is
/// `1 - jaccard` of their motif sets; factors without shared motifs are not
/// connected.
#[derive(Debug, Clone, Default)]
pub struct MotifGraph {
    graph: UnGraph<String, f64>,
    nodes: HashMap<String, NodeIndex>,
}

pub fn jaccard<T: Ord>(a: &std::collections::BTreeSet<T>, b: &std::collections::BTreeSet<T>) -> f64 {
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

impl MotifGraph {
    pub fn build(f2m: &FactorMotifs) -> Self {
        let mut graph = UnGraph::<String, f64>::default();
        let mut nodes = HashMap::new();
        let factors: Vec<&String> = f2m.keys().collect();

        for (i, tf1) in factors.iter().enumerate() {
            for tf2 in &factors[i + 1..] {
                let ji = jaccard(&f2m[*tf1], &f2m[*tf2]);
                if ji > 0.0 {
                    let a = *nodes
                        .entry((*tf1).clone())
                        .or_insert_with(|| graph.add_node((*tf1).clone()));
                    let b = *nodes
                        .entry((*tf2).clone())
                        .or_insert_with(|| graph.add_node((*tf2).clone()));
                    graph.add_edge(a, b, 1.0 - ji);
                }
            }
        }
        debug!(
            "Motif graph: {} factors, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Self { graph, nodes }
    }

    pub fn contains(&self, factor: &str) -> bool {
        self.nodes.contains_key(factor)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edge_weight(&self, tf1: &str, tf2: &str) -> Option<f64> {
        let (a, b) = (*self.nodes.get(tf1)?, *self.nodes.get(tf2)?);
        let edge = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Factors reachable from `factor` with a summed path weight of at most
    /// `max_distance`, closest first. Equal distances are ordered by name.
    /// `factor` itself is not included.
    pub fn neighbours_within(&self, factor: &str, max_distance: f64) -> Vec<(String, f64)> {
        let Some(&start) = self.nodes.get(factor) else {
            return Vec::new();
        };
        let costs = dijkstra(&self.graph, start, None, |e| *e.weight());

        let mut hits: Vec<(String, f64)> = costs
            .into_iter()
            .filter(|&(node, cost)| node != start && cost <= max_distance + 1e-12)
            .map(|(node, cost)| (self.graph[node].clone(), cost))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeSet;

    fn f2m(entries: &[(&str, &[&str])]) -> FactorMotifs {
        entries
            .iter()
            .map(|(f, ms)| {
                (
                    f.to_string(),
                    ms.iter().map(|m| m.to_string()).collect::<BTreeSet<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn jaccard_edges() {
        let g = MotifGraph::build(&f2m(&[
            ("A", &["m1", "m2"]),
            ("B", &["m2", "m3"]),
            ("C", &["m9"]),
        ]));
        assert_abs_diff_eq!(g.edge_weight("A", "B").unwrap(), 1.0 - 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!((g.edge_weight("A", "B").unwrap() * 1000.0).round() / 1000.0, 0.667);
        assert!(g.edge_weight("A", "C").is_none());
        assert!(!g.contains("C"));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = MotifGraph::build(&f2m(&[("X", &["m1"]), ("Y", &["m1", "m2"]), ("Z", &["m2"])]));
        let b = MotifGraph::build(&f2m(&[("Z", &["m2"]), ("Y", &["m2", "m1"]), ("X", &["m1"])]));
        for (p, q) in [("X", "Y"), ("Y", "Z"), ("X", "Z")] {
            assert_eq!(a.edge_weight(p, q), b.edge_weight(p, q));
            assert_eq!(a.edge_weight(p, q), a.edge_weight(q, p));
        }
    }

    #[test]
    fn neighbours_sorted_by_path_weight() {
        // X-Y: 1 - 4/5 = 0.2, Y-Z: 1 - 1/6
        let g = MotifGraph::build(&f2m(&[
            ("X", &["m1", "m2", "m3", "m4"]),
            ("Y", &["m1", "m2", "m3", "m4", "m5"]),
            ("Z", &["m5", "m6"]),
        ]));
        let near = g.neighbours_within("X", 1.1);
        assert_eq!(near[0].0, "Y");
        assert_abs_diff_eq!(near[0].1, 0.2, epsilon = 1e-9);
        // Z is reached through Y (0.2 + weight(Y, Z)) rather than directly
        assert_eq!(near.len(), 2);
        assert_eq!(near[1].0, "Z");
        assert_abs_diff_eq!(near[1].1, 0.2 + 5.0 / 6.0, epsilon = 1e-9);

        assert!(g.neighbours_within("X", 0.1).is_empty());
        assert!(g.neighbours_within("unknown", 1.0).is_empty());
    }
}
