// Relationship graph builder
// User and receiver identities become nodes of an undirected graph; repeated
// interactions accumulate into weighted edges. Only the size-adaptive
// top-centrality band is persisted

use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet};

use crate::entities::{GraphEdge, GraphNode, GraphSummary, UnifiedEvent};

#[derive(Debug)]
pub struct GraphOutcome {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: GraphSummary,
}

struct EdgeData {
    edge_type: String,
    weight: u64,
}

pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build(case_id: &str, events: &[UnifiedEvent]) -> GraphOutcome {
        let mut graph: UnGraph<String, EdgeData> = UnGraph::new_undirected();
        let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

        let mut node_index = |graph: &mut UnGraph<String, EdgeData>, name: &str| {
            *index_of
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };

        for event in events {
            let user = node_index(&mut graph, &event.user_id);
            let Some(receiver) = &event.receiver else {
                continue;
            };
            let receiver = node_index(&mut graph, receiver);
            match graph.find_edge(user, receiver) {
                Some(edge) => graph[edge].weight += 1,
                None => {
                    // First occurrence fixes the edge's type label.
                    graph.add_edge(
                        user,
                        receiver,
                        EdgeData {
                            edge_type: event.event_type.clone(),
                            weight: 1,
                        },
                    );
                }
            }
        }

        let total_nodes = graph.node_count();
        let threshold = adaptive_band(total_nodes);

        // Degree centrality: fraction of other nodes each node touches.
        let mut ranked: Vec<(String, f64)> = graph
            .node_indices()
            .map(|index| {
                let centrality = if total_nodes > 1 {
                    graph.edges(index).count() as f64 / (total_nodes - 1) as f64
                } else {
                    1.0
                };
                (graph[index].clone(), centrality.min(1.0))
            })
            .collect();
        ranked.sort_by(|(a_name, a_cent), (b_name, b_cent)| {
            b_cent
                .partial_cmp(a_cent)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_name.cmp(b_name))
        });

        let keep_count = (total_nodes as f64 * threshold).ceil() as usize;
        let kept: Vec<(String, f64)> = ranked.into_iter().take(keep_count).collect();
        let kept_names: HashSet<&str> = kept.iter().map(|(name, _)| name.as_str()).collect();

        let nodes: Vec<GraphNode> = kept
            .iter()
            .map(|(name, centrality)| GraphNode {
                case_id: case_id.to_string(),
                node_id: name.clone(),
                node_type: "user".to_string(),
                centrality: *centrality,
                label: name.clone(),
            })
            .collect();

        let edges: Vec<GraphEdge> = graph
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = graph.edge_endpoints(edge)?;
                let source = graph[a].as_str();
                let target = graph[b].as_str();
                if kept_names.contains(source) && kept_names.contains(target) {
                    Some(GraphEdge {
                        case_id: case_id.to_string(),
                        source: source.to_string(),
                        target: target.to_string(),
                        edge_type: graph[edge].edge_type.clone(),
                        weight: graph[edge].weight,
                    })
                } else {
                    None
                }
            })
            .collect();

        let density = if total_nodes > 1 {
            2.0 * graph.edge_count() as f64 / (total_nodes as f64 * (total_nodes - 1) as f64)
        } else {
            0.0
        };

        GraphOutcome {
            summary: GraphSummary {
                nodes: nodes.len(),
                edges: edges.len(),
                density,
                total_nodes,
                threshold,
            },
            nodes,
            edges,
        }
    }
}

/// Larger graphs keep a wider top-centrality band, bounding stored graph size
/// as cases grow at the cost of long-tail nodes.
fn adaptive_band(total_nodes: usize) -> f64 {
    if total_nodes > 100 {
        0.15
    } else if total_nodes > 50 {
        0.10
    } else {
        0.05
    }
}
