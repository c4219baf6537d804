use std::rc::Rc;

use crate::{
    gadget::{Gadget, Gadgetry},
    message::Message,
};

/// `swap [value]`: sends the incoming message out of the right outlet, then
/// the construction value out of the left one.
pub fn swap(args: Message) -> Rc<dyn Gadgetry> {
    let fixed = args.clone();
    let g = Gadget::new("swap", args);
    g.add_inlet(move |g, m| {
        g.emit(1, m);
        g.emit(0, fixed.clone());
    });
    g.add_outlets(2);
    Rc::new(g)
}
