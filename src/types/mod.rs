mod ecosystem;
mod records;

pub use ecosystem::*;
pub use records::*;
