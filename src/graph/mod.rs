//! In-memory graph operations over edge snapshots.

pub mod builder;
pub mod community;
pub mod traversal;

pub use builder::{Adjacency, GraphBuilder};
pub use community::{detect_communities, group_by_label, CommunityParams};
pub use traversal::{propagate, InfluencePath, PropagationParams, PropagationResult};
