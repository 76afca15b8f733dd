pub mod api;
pub mod auth;
pub mod capture;
pub mod overlay;
pub mod pipeline;
pub mod system;
