pub mod error;
pub mod file_store;
pub mod identity;
pub mod prekeys;
pub mod ratchet;
pub mod store;

pub use error::CryptoError;
pub use identity::{Identity, RemoteIdentity};
pub use prekeys::PreKeyBundle;
pub use ratchet::{DoubleRatchetSession, RatchetSession};
