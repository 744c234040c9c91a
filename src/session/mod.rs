//! Session persistence: a swappable key/value [`Storage`] backend and the
//! typed [`TokenStore`] on top of it.

mod storage;
mod store;

pub use storage::FileStorage;
pub use storage::MemoryStorage;
pub use storage::Storage;
pub use storage::StorageOp;
pub use store::AuthSession;
pub use store::DEFAULT_EXPIRES_IN;
pub use store::DEFAULT_MARKET;
pub use store::MAX_EXPIRES_IN;
pub use store::PendingAuthorization;
pub use store::TokenStore;
