//! A convenience module that re-exports commonly used items from both
//! [`kraken_core`] and [`kraken_scheduler`].
//!
//! ```
//! use kraken::prelude::*;
//! ```

pub use kraken_core::prelude::*;
pub use kraken_scheduler::prelude::*;
