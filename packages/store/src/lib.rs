pub mod error;
pub mod models;
pub mod repo;

mod file_store;
mod memory;
pub use file_store::FileStore;
pub use memory::MemoryStore;

pub use error::{StoreError, StoreResult};
pub use models::{Account, CurrentUser, PendingLogin, Profile, Task, PROVIDER_EMAIL, PROVIDER_LOCAL};
pub use repo::{AccountStore, DataStore, OAuthStateStore, ProfileStore, TaskStore};
