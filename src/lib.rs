pub mod circuit;
pub mod config;
pub mod debug;
pub mod gadget;
pub mod gadgets;
pub mod logger;
pub mod message;
pub mod notifier;
pub mod patch;
pub mod patch_commands;
pub mod registry;
pub mod scheduler;

pub use circuit::{Circuit, Position, Wire};
pub use gadget::{Gadget, Gadgetry};
pub use message::{Atom, Message};
pub use notifier::{Notifier, Subscription};
pub use patch::{PatchError, parse_patch, write_patch};
pub use registry::{lookup_gadget, register_gadget};
pub use scheduler::{Scheduler, Tick, TimerId};
