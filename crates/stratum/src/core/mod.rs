//! Core building blocks shared by the model, the layouts and the managers
//!
//! Error types, geometry primitives, the publish/subscribe channel and the
//! logging setup live here.

mod error;
pub mod events;
pub mod logging;
mod types;

pub use error::*;
pub use events::*;
pub use logging::*;
pub use types::*;
