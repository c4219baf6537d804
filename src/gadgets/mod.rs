//! The built-in gadget types.
pub mod bridge;
pub mod pass;
pub mod print;
pub mod swap;

use crate::registry::GadgetFactory;

/// Every built-in gadget, by registry name.
pub fn builtins() -> Vec<(&'static str, GadgetFactory)> {
    vec![
        ("print", print::print as GadgetFactory),
        ("pass", pass::pass),
        ("swap", swap::swap),
        ("inlet", bridge::inlet),
        ("outlet", bridge::outlet),
    ]
}
