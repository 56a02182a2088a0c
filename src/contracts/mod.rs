pub mod anchor_registry;
pub mod did_registry;
