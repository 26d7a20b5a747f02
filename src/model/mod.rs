pub mod bindings;
pub mod capability;
pub mod meta;
pub mod orchestrator;
