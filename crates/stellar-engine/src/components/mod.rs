pub mod animation;
pub mod background;
pub mod entity;
pub mod sprite;
