pub mod cache;
pub mod client;
pub mod extract;
pub mod verify;

pub use cache::*;
pub use client::*;
pub use extract::*;
pub use verify::*;
