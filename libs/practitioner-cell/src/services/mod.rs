pub mod store;

pub use store::{InMemoryPractitionerStore, PractitionerStore, SupabasePractitionerStore};
