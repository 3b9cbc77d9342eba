pub mod account;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod memory;
pub mod models;
pub mod reconcile;
pub mod search;
pub mod selection;
pub mod sequence;
pub mod service;
pub mod spoonacular;
pub mod store;

pub use catalog::Catalog;
pub use gateway::Gateway;
pub use reconcile::Reconciler;
pub use service::{PantryService, RecipeApi};
pub use store::DataStore;
