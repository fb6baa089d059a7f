pub mod lifetime;
pub mod ownership;
pub mod symbols;
pub mod type_checker;

pub use lifetime::LifetimeAnalyzer;
pub use ownership::{OwnState, OwnershipAnalyzer, StateMap};
pub use symbols::{Binding, BindingId, LifetimeTag, SymbolTable, TypeRegistry};
pub use type_checker::TypeChecker;
