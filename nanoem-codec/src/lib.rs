pub mod common;
pub mod model;
pub mod motion;
pub mod mutable;
pub mod utils;
