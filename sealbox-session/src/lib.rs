//! Edit-in-place session manager for sealbox containers.
//!
//! Decrypts a container into volatile storage, lets an arbitrary external
//! program work on the plaintext, and transparently re-encrypts on every
//! change while the program runs. Concurrent openers of the same
//! container are arbitrated through a non-blocking advisory lock: the
//! winner edits, everyone else gets a read-only view that follows the
//! writer's changes.
//!
//! The manager never learns how the container is unlocked; it only sees
//! an [`UnlockCapability`] with `decrypt`/`encrypt` bound to one
//! container and one already-resolved credential.

mod command;
mod error;
mod lock;
mod session;
mod staging;
mod unlock;

pub use error::{SessionError, SessionResult};
pub use lock::{lock_path, try_acquire, LockState, SessionLock};
pub use session::{EditSession, SessionMode, SessionReport};
pub use unlock::{IdentityUnlock, PasswordUnlock, UnlockCapability};
