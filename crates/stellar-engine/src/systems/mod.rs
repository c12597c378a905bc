pub mod render;
pub mod update;
