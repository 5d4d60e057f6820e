pub mod identity;
pub mod item;
