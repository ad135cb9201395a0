// Re-export all model types for ease of use

pub mod account;
pub mod folder;
pub mod probe;

pub use account::*;
pub use folder::*;
pub use probe::*;
