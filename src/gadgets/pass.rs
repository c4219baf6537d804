use std::rc::Rc;

use crate::{
    gadget::{Gadget, Gadgetry},
    message::Message,
};

/// `pass`: sends every message straight on.
pub fn pass(args: Message) -> Rc<dyn Gadgetry> {
    let g = Gadget::new("pass", args);
    g.add_inlet(|g, m| g.emit(0, m));
    g.add_outlets(1);
    Rc::new(g)
}
