use std::rc::Rc;

use glow::{
    Circuit, Gadget, Gadgetry, Message,
    debug::capture_debug,
    lookup_gadget, msg, register_gadget,
};

fn gadget(name: &str, args: Message) -> Rc<dyn Gadgetry> {
    lookup_gadget(name, args).unwrap_or_else(|| panic!("no gadget [{name}]"))
}

// picks one element out of a vector, by the index given as argument
fn pick(args: Message) -> Rc<dyn Gadgetry> {
    let index = args.as_int() as usize;
    let g = Gadget::new("pick", args);
    g.add_inlet(move |g, m| g.emit(0, m.at(&[index])));
    g.add_outlets(1);
    Rc::new(g)
}

#[test]
fn test_custom_gadget_in_a_patch() {
    register_gadget("pick", pick);
    let out = capture_debug();
    let c = Circuit::from_text(
        "#X obj 0 0 inlet;\n\
         #X obj 0 30 pick 2;\n\
         #X obj 0 60 print picked;\n\
         #X connect 0 0 1 0;\n\
         #X connect 1 0 2 0;\n",
    )
    .unwrap();

    c.feed(0, msg![1, "two", msg![3, 4]]);
    c.feed(0, msg![1]);

    assert_eq!(out.contents(), "picked 3 4\npicked []\n");
}

#[test]
fn test_fan_out_order_is_wiring_order() {
    let out = capture_debug();
    let c = Circuit::new();
    c.add(gadget("inlet", Message::bang()));
    for label in ["a", "b", "c"] {
        c.add(gadget("print", msg![label]));
    }
    c.add_wire(0, 0, 3, 0);
    c.add_wire(0, 0, 1, 0);
    c.add_wire(0, 0, 2, 0);

    c.feed(0, Message::from("go"));

    assert_eq!(out.contents(), "c go\na go\nb go\n");
}

#[test]
fn test_circuit_outlet_feeds_outside_gadget() {
    let out = capture_debug();
    let inner = Circuit::new();
    inner.add(gadget("inlet", Message::bang()));
    inner.add(gadget("swap", msg!["fixed"]));
    inner.add(gadget("outlet", Message::bang()));
    inner.add(gadget("outlet", Message::bang()));
    inner.add_wire(0, 0, 1, 0);
    inner.add_wire(1, 0, 2, 0);
    inner.add_wire(1, 1, 3, 0);

    let left = gadget("print", msg!["left"]);
    let right = gadget("print", msg!["right"]);
    inner.connect(0, &left, 0);
    inner.connect(1, &right, 0);

    inner.feed(0, msg![9]);

    assert_eq!(out.contents(), "right 9\nleft fixed\n");
}

#[test]
fn test_gadgets_survive_only_while_held() {
    let out = capture_debug();
    let source = gadget("pass", Message::bang());
    {
        let sink = gadget("print", Message::bang());
        source.connect(0, &sink, 0);
        source.feed(0, msg!["seen"]);
    }
    source.feed(0, msg!["unseen"]);
    assert_eq!(out.contents(), "seen\n");
}
