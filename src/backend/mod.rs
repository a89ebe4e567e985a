//! Backend abstraction layer
//!
//! Provides the common trait and types implemented by the wgpu backend and by
//! the recording headless backend.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use headless::HeadlessBackend;
pub use traits::*;
pub use types::*;
