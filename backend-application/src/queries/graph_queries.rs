use serde::Serialize;
use tracing::error;

use crate::{AppError, AppState};
use backend_domain::{GraphEdge, GraphNode};

#[derive(Debug, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub async fn get_graph(state: &AppState, case_id: &str) -> Result<GraphView, AppError> {
    let nodes = state.graph_repo.fetch_nodes(case_id).await.map_err(|err| {
        error!("failed to fetch graph nodes: {}", err);
        AppError::Internal(err)
    })?;
    let edges = state.graph_repo.fetch_edges(case_id).await.map_err(|err| {
        error!("failed to fetch graph edges: {}", err);
        AppError::Internal(err)
    })?;
    Ok(GraphView { nodes, edges })
}
