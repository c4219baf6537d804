use std::{cell::Cell, rc::Rc};

use glow::{
    Circuit, Gadgetry, Message, Scheduler, debug::capture_debug, msg,
};

const COUNTER: &str = "#N canvas 0 50 450 300 10;
#X obj 10 10 inlet;
#X obj 10 40 print tick;
#X connect 0 0 1 0;
";

#[test]
fn test_periodic_timer_drives_a_circuit() {
    let out = capture_debug();
    let circuit = Circuit::from_text(COUNTER).unwrap();
    let sched = Scheduler::new();

    let c = Rc::clone(&circuit);
    sched.set_periodic(100, move |s| c.feed(0, Message::from(s.now() as i64)));
    sched.run(350);

    assert_eq!(out.contents(), "tick 100\ntick 200\ntick 300\n");
    assert_eq!(sched.now(), 350);
    assert_eq!(sched.next_timer(), Some(400));
}

#[test]
fn test_notifier_topic_fired_from_timer() {
    let out = capture_debug();
    let circuit = Circuit::from_text(COUNTER).unwrap();
    let sched = Scheduler::new();

    let target = Rc::downgrade(&circuit);
    circuit.notifier().on("poke", move |args| {
        if let Some(c) = target.upgrade() {
            c.feed(0, args.clone());
        }
    });

    let c = Rc::clone(&circuit);
    sched.set_timer(25, move |s| {
        c.notifier().notify("poke", msg!["at", s.now() as i64]);
    });
    let c = Rc::clone(&circuit);
    let cancelled = sched.set_timer(30, move |_| c.notifier().notify("poke", msg!["never"]));

    sched.run(20);
    assert_eq!(out.contents(), "");
    assert!(sched.cancel_timer(cancelled));
    sched.run(100);

    assert_eq!(out.contents(), "tick at 25\n");
    assert_eq!(sched.next_timer(), None);
}

#[test]
fn test_one_shot_fires_once() {
    let sched = Scheduler::new();
    let count = Rc::new(Cell::new(0));
    let n = Rc::clone(&count);
    sched.set_timer(7, move |_| n.set(n.get() + 1));
    sched.run(7);
    sched.run(100);
    assert_eq!(count.get(), 1);
    assert_eq!(sched.now(), 107);
}
