//! Query modules: free functions over a borrowed connection.

pub mod fact_ops;
pub mod relation_ops;
