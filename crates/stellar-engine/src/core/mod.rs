pub mod collision;
pub mod mask;
pub mod registry;
pub mod room;
pub mod time;
