//! mongobox: disposable `mongod` instances for integration tests
//!
//! Brings up an isolated MongoDB server on a private data directory and
//! port, blocks the caller until the instance accepts connections (or
//! fails deterministically), optionally imports a seed dump, and tears
//! everything down again - process reaped, owned directory deleted.
//!
//! # Architecture
//!
//! - [`supervisor`]: the lifecycle state machine (`Idle -> Starting ->
//!   Running -> Stopping -> Idle`), readiness barrier, and teardown
//! - [`config`]: user-facing knobs and the validating constructor path
//! - [`seed`]: post-startup dump import via the external restore tool
//! - [`util`]: leaf collaborators - binary discovery and free-port
//!   selection
//!
//! # Design principles
//!
//! 1. **Validate once, then immutable** - binary path, port, and flags
//!    are pinned by a validating constructor; a rejected configuration
//!    never produces a half-built supervisor
//! 2. **Blocking by intent** - readiness is a synchronous barrier, not a
//!    future; a returned `start()` means the port accepts connections
//! 3. **Teardown is never the error path** - `stop()` cannot fail, and
//!    cleanup after a failed start logs secondary errors instead of
//!    masking the primary one
//! 4. **Scope-bound resources** - dropping the supervisor stops the
//!    child and removes any owned directory, panics included
//!
//! # Example
//!
//! ```no_run
//! use mongobox::{InstanceConfig, MongoBox};
//!
//! # fn main() -> mongobox::Result<()> {
//! let mut mongo = MongoBox::new(InstanceConfig::default())?;
//! mongo.start()?;
//! assert!(mongo.running());
//! let uri = mongo.uri();
//! // ... exercise the code under test against `uri` ...
//! mongo.stop();
//! # Ok(())
//! # }
//! ```

// Configuration & validation
pub mod config;

// Error taxonomy
pub mod error;

// Lifecycle supervision
pub mod supervisor;

// Leaf collaborators
pub mod util;

// Seed-dump import (internal; surfaced through `MongoBox::start`)
mod seed;

// Re-export the everyday surface
pub use config::InstanceConfig;
pub use error::{MongoBoxError, Result};
pub use supervisor::{Lifecycle, MongoBox};
