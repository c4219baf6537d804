use std::rc::Rc;

use crate::{
    debug::write_debug,
    gadget::{Gadget, Gadgetry},
    message::Message,
};

/// `print [prefix]`: writes every message it receives to the debug sink.
pub fn print(args: Message) -> Rc<dyn Gadgetry> {
    let prefix = (!args.is_bang()).then(|| args.to_string());
    let g = Gadget::new("print", args);
    g.add_inlet(move |_, m| match &prefix {
        Some(prefix) => write_debug(&format!("{prefix} {m}\n")),
        None => write_debug(&format!("{m}\n")),
    });
    Rc::new(g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{debug::capture_debug, msg};

    #[test]
    fn test_print_gadget() {
        let out = capture_debug();
        let g = print(Message::bang());
        g.feed(0, msg!["hello"]);
        assert_eq!(out.contents(), "hello\n");
        assert_eq!(g.num_inlets(), 1);
        assert_eq!(g.num_outlets(), 0);
    }

    #[test]
    fn test_print_gadget_arg() {
        let out = capture_debug();
        let g = print(msg![123]);
        g.feed(0, msg!["hello"]);
        g.feed(0, msg![1, msg![2, 3]]);
        assert_eq!(out.contents(), "123 hello\n123 1 [2 3]\n");
    }

    #[test]
    fn test_print_bang() {
        let out = capture_debug();
        print(msg!["bang:"]).feed(0, Message::bang());
        assert_eq!(out.contents(), "bang: []\n");
    }
}
