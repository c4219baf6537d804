//! `inlet` and `outlet`: the members that give a circuit its own ports.
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};
use tracing::{debug, trace};

use crate::{
    circuit::Circuit,
    gadget::{Gadget, Gadgetry},
    message::Message,
};

/// `inlet`: relays what the enclosing circuit is fed into its interior.
pub fn inlet(args: Message) -> Rc<dyn Gadgetry> {
    let g = Gadget::new("inlet", args);
    g.add_inlet(|g, m| g.emit(0, m));
    g.add_outlets(1);
    g.set_on_added(|_, circuit, index| {
        let port = circuit.bind_inlet(index);
        debug!(member = index, port, "circuit inlet bound");
    });
    Rc::new(g)
}

#[derive(Clone)]
struct OutletBinding {
    circuit: Weak<Circuit>,
    port: usize,
}

/// `outlet`: relays what it receives out of the enclosing circuit.
pub fn outlet(args: Message) -> Rc<dyn Gadgetry> {
    let binding: Rc<RefCell<Option<OutletBinding>>> = Rc::new(RefCell::new(None));
    let g = Gadget::new("outlet", args);
    let target = Rc::clone(&binding);
    g.add_inlet(move |_, m| {
        let bound = target.borrow().clone();
        match bound.and_then(|b| b.circuit.upgrade().map(|c| (c, b.port))) {
            Some((circuit, port)) => circuit.emit(port, m),
            None => trace!("outlet is not part of a live circuit, dropping message"),
        }
    });
    g.set_on_added(move |_, circuit, index| {
        let port = circuit.add_outlets(1);
        *binding.borrow_mut() = Some(OutletBinding {
            circuit: circuit.downgrade(),
            port,
        });
        debug!(member = index, port, "circuit outlet bound");
    });
    Rc::new(g)
}
