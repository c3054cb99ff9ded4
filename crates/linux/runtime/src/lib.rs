pub mod orig;
pub mod memory;
pub mod symbol;

pub use symbol::ResolveError;
