pub mod api;
pub mod wiki;
