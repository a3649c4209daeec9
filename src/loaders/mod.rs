pub mod context;
pub mod java;
pub mod repack;
