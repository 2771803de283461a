pub mod backend;
pub mod devices;
pub mod error;
pub mod execution;
pub mod modes;
pub mod physics;
pub mod signals;
pub mod types;

#[cfg(test)]
mod tests;
