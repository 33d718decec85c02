pub mod error;
pub mod publish;
mod reading;

pub use reading::*;

pub static CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
