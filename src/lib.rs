//! A self-update agent: fetches a signed manifest, stages and verifies new
//! files, then commits them over the running installation with a
//! best-effort rollback if the commit is interrupted partway through.
//!
//! ```no_run
//! use megacmd_updater::{config::Config, executor::TransactionExecutor, fs_ops::RealFs, lock::LockHandle};
//!
//! let _lock = LockHandle::acquire(false)?;
//! let config = Config::from_env(false)?;
//! let fs = RealFs;
//! let mut executor = TransactionExecutor::new(&config, &fs)?;
//! let outcome = executor.run(false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod base64;
pub mod config;
pub mod download;
pub mod error;
pub mod executor;
pub mod fs_ops;
pub mod lock;
pub mod manifest;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use error::{Result, UpdaterError};
pub use executor::{Outcome, State, TransactionExecutor};
