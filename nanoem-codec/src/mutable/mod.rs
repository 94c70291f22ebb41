pub mod common;
pub mod model;
pub mod motion;
