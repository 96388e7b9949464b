#![allow(clippy::manual_range_contains, clippy::needless_range_loop)]

/// Use mimalloc as the global allocator.
/// 2-3x faster than glibc malloc for small allocations, which dominate
/// when extracting many short payload spans from one document.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod alphabet;
pub mod common;
pub mod decode;
pub mod error;
pub mod extract;
pub mod pipeline;

pub use error::DecodeError;
