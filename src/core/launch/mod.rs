pub mod classpath;
pub mod task;

pub use classpath::{build_classpath, cleanup_natives, extract_natives};
pub use task::launch;
