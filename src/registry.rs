//! The registry: a process-wide collection of named gadget constructors.
use std::rc::Rc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::{gadget::Gadgetry, gadgets, message::Message};

/// Builds a new gadget from its construction arguments.
pub type GadgetFactory = fn(Message) -> Rc<dyn Gadgetry>;

// Filled with the built-in gadgets on first use.
static GADGET_REGISTRY: Lazy<DashMap<String, GadgetFactory>> = Lazy::new(|| {
    let registry = DashMap::new();
    for (name, factory) in gadgets::builtins() {
        registry.insert(name.to_string(), factory);
    }
    registry
});

/// Registers a constructor under `name`, replacing any previous entry.
pub fn register_gadget(name: &str, factory: GadgetFactory) {
    debug!(name, "gadget registered");
    GADGET_REGISTRY.insert(name.to_string(), factory);
}

/// Removes a constructor. Returns false if nothing was registered under `name`.
pub fn unregister_gadget(name: &str) -> bool {
    GADGET_REGISTRY.remove(name).is_some()
}

/// Instantiates a gadget from the registry. Unknown names give `None`.
pub fn lookup_gadget(name: &str, args: Message) -> Option<Rc<dyn Gadgetry>> {
    let Some(factory) = GADGET_REGISTRY.get(name).map(|entry| *entry.value()) else {
        trace!(name, "unknown gadget");
        return None;
    };
    Some(factory(args))
}

pub fn is_registered(name: &str) -> bool {
    GADGET_REGISTRY.contains_key(name)
}

/// All registered names, sorted.
pub fn registered_names() -> Vec<String> {
    let mut names: Vec<String> = GADGET_REGISTRY.iter().map(|e| e.key().clone()).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{debug::capture_debug, gadget::Gadget, msg};

    #[test]
    fn test_unknown_gadget() {
        assert!(lookup_gadget("blah", Message::bang()).is_none());
        assert!(!is_registered("blah"));
    }

    #[test]
    fn test_builtins_are_registered() {
        let names = registered_names();
        for name in ["inlet", "outlet", "pass", "print", "swap"] {
            assert!(names.contains(&name.to_string()), "missing [{name}]");
        }
        let g = lookup_gadget("print", Message::bang()).expect("could not find [print]");
        assert_eq!(g.kind(), "print");
    }

    #[test]
    fn test_lookup_passes_args() {
        let out = capture_debug();
        let g = lookup_gadget("print", msg![123]).unwrap();
        assert_eq!(g.args(), &msg![123]);
        g.feed(0, msg!["hello"]);
        assert_eq!(out.contents(), "123 hello\n");
    }

    fn twice(args: Message) -> Rc<dyn Gadgetry> {
        let g = Gadget::new("twice", args);
        g.add_inlet(|g, m| {
            g.emit(0, m.clone());
            g.emit(0, m);
        });
        g.add_outlets(1);
        Rc::new(g)
    }

    #[test]
    fn test_register_and_unregister() {
        register_gadget("registry-test-twice", twice);
        let out = capture_debug();
        let g = lookup_gadget("registry-test-twice", Message::bang()).unwrap();
        let p = lookup_gadget("print", Message::bang()).unwrap();
        g.connect(0, &p, 0);
        g.feed(0, msg!["x"]);
        assert_eq!(out.contents(), "x\nx\n");

        assert!(unregister_gadget("registry-test-twice"));
        assert!(lookup_gadget("registry-test-twice", Message::bang()).is_none());
        assert!(!unregister_gadget("registry-test-twice"));
    }
}
