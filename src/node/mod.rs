pub mod state;

pub use state::{KnownNodes, NodeState};
