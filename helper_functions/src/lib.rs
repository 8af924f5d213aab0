pub mod misc;
pub mod signing;

mod error;
