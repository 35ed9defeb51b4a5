//! Vulkan compute demo: upload a float array, square every element on the
//! GPU, read the results back.
//!
//! [`backend`] wraps the ash handles, [`dispatch`] sequences one kernel run,
//! [`config`] and [`logging`] are shared by the two binaries.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod logging;
