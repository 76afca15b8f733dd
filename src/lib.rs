pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;
