pub mod app;
pub mod sync;
