//! Top-level facade crate for tollgate.
//!
//! Re-exports core types and the throttling node so users can depend on a single crate.

pub mod core {
    pub use tollgate_core::*;
}

pub mod node {
    pub use tollgate_node::*;
}
