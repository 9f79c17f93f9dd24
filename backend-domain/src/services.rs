// Domain services: the analytics pipeline proper

pub mod anomaly;
pub mod features;
pub mod forest;
pub mod graph;
pub mod normalizer;
pub mod risk;
pub mod rules;

pub use anomaly::*;
pub use features::*;
pub use forest::*;
pub use graph::*;
pub use normalizer::*;
pub use risk::*;
pub use rules::*;
