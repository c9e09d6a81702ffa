pub mod matching;
pub mod store;

pub use matching::MatchService;
pub use store::{InMemoryMatchStore, MatchStore, SupabaseMatchStore};
