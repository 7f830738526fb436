//! Configuration text rendering.
//!
//! Renderers are pure functions of finalized site state; they never touch
//! tunnel lists or counters.

pub mod device;
pub mod internet;

pub use device::DeviceConfigRenderer;
pub use internet::InternetRouterRenderer;
