mod paylink_world;
mod setups;
mod steps;

pub use paylink_world::PaylinkWorld;
