pub mod filesystem;
pub mod isolation;

pub use filesystem::FileStorage;
pub use isolation::{contained_join, SessionRoot, SessionRoots};
