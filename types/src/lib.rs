pub mod chain_state;
pub mod config;
pub mod consts;
pub mod containers;
pub mod nonstandard;
pub mod primitives;
pub mod traits;
