pub mod builders;
pub mod failing_repository;
pub mod strategies;

pub use builders::*;
pub use failing_repository::*;
pub use strategies::*;
