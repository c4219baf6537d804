//! Gadgets: the atomic units of a dataflow graph.
//!
//! A gadget owns a list of inlets (handlers) and a list of outlets (fan-out
//! lists of endpoints). Propagation is plain synchronous recursion: `emit`
//! feeds every connected inlet before it returns.
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};
use tracing::{debug, trace};

use crate::{circuit::Circuit, message::Message};

/// Inlet handler. Receives the gadget it belongs to so it can emit.
pub type Handler = Rc<dyn Fn(&Gadget, Message)>;

/// Hook run when a gadget is added to a circuit, with its member index.
pub type AddedHook = Rc<dyn Fn(&Gadget, &Circuit, usize)>;

/// The common interface of all gadgets and circuits.
pub trait Gadgetry {
    /// Registry name this gadget was built under.
    fn kind(&self) -> &str;
    /// Construction-time arguments.
    fn args(&self) -> &Message;
    /// Called once the gadget has been added to `circuit` at member `index`.
    fn added_to(&self, circuit: &Circuit, index: usize);
    /// Wire `outlet` to inlet `inlet` of `target`.
    fn connect(&self, outlet: usize, target: &Rc<dyn Gadgetry>, inlet: usize);
    /// Deliver a message to an inlet, synchronously.
    fn feed(&self, inlet: usize, msg: Message);
    /// Send a message out of an outlet to everything connected to it.
    fn emit(&self, outlet: usize, msg: Message);
    fn num_inlets(&self) -> usize;
    fn num_outlets(&self) -> usize;
    fn as_circuit(&self) -> Option<&Circuit> {
        None
    }
}

/// A non-owning reference to one inlet of some gadget.
#[derive(Clone)]
pub struct Endpoint {
    gadget: Weak<dyn Gadgetry>,
    inlet: usize,
}

impl Endpoint {
    pub fn new(gadget: &Rc<dyn Gadgetry>, inlet: usize) -> Self {
        Endpoint {
            gadget: Rc::downgrade(gadget),
            inlet,
        }
    }

    pub fn inlet(&self) -> usize {
        self.inlet
    }

    pub fn target(&self) -> Option<Rc<dyn Gadgetry>> {
        self.gadget.upgrade()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self
            .target()
            .map(|g| g.kind().to_string())
            .unwrap_or_else(|| "<dropped>".to_string());
        f.debug_struct("Endpoint")
            .field("gadget", &kind)
            .field("inlet", &self.inlet)
            .finish()
    }
}

/// An inlet accepts messages.
pub struct Inlet {
    handler: Handler,
}

/// An outlet publishes messages to its endpoints, in connection order.
#[derive(Clone, Debug, Default)]
pub struct Outlet(Vec<Endpoint>);

impl Outlet {
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.0
    }
}

/// The base type for all gadgets.
pub struct Gadget {
    kind: String,
    args: Message,
    inlets: RefCell<Vec<Inlet>>,
    outlets: RefCell<Vec<Outlet>>,
    on_added: RefCell<Option<AddedHook>>,
}

impl Gadget {
    pub fn new(kind: impl Into<String>, args: Message) -> Self {
        Gadget {
            kind: kind.into(),
            args,
            inlets: RefCell::new(Vec::new()),
            outlets: RefCell::new(Vec::new()),
            on_added: RefCell::new(None),
        }
    }

    /// Set up a new inlet. Inlets are numbered in the order they are added.
    pub fn add_inlet<F>(&self, handler: F)
    where
        F: Fn(&Gadget, Message) + 'static,
    {
        self.inlets.borrow_mut().push(Inlet {
            handler: Rc::new(handler),
        });
    }

    /// Set up `n` new outlets, returning the index of the first one.
    pub fn add_outlets(&self, n: usize) -> usize {
        let mut outlets = self.outlets.borrow_mut();
        let first = outlets.len();
        outlets.resize_with(first + n, Outlet::default);
        first
    }

    pub fn set_on_added<F>(&self, hook: F)
    where
        F: Fn(&Gadget, &Circuit, usize) + 'static,
    {
        *self.on_added.borrow_mut() = Some(Rc::new(hook));
    }

    /// Snapshot of the endpoints currently wired to `outlet`.
    pub fn endpoints(&self, outlet: usize) -> Vec<Endpoint> {
        self.outlets.borrow()[outlet].0.clone()
    }
}

impl Gadgetry for Gadget {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn args(&self) -> &Message {
        &self.args
    }

    fn added_to(&self, circuit: &Circuit, index: usize) {
        let hook = self.on_added.borrow().clone();
        if let Some(hook) = hook {
            hook(self, circuit, index);
        }
    }

    fn connect(&self, outlet: usize, target: &Rc<dyn Gadgetry>, inlet: usize) {
        debug!(from = %self.kind, outlet, to = %target.kind(), inlet, "connect");
        self.outlets.borrow_mut()[outlet].0.push(Endpoint::new(target, inlet));
    }

    fn feed(&self, inlet: usize, msg: Message) {
        let handler = Rc::clone(&self.inlets.borrow()[inlet].handler);
        let _depth = DepthGuard::enter();
        trace!(gadget = %self.kind, inlet, %msg, "feed");
        handler(self, msg);
    }

    fn emit(&self, outlet: usize, msg: Message) {
        // the endpoint list is copied so handlers may rewire while we deliver
        let endpoints = self.endpoints(outlet);
        deliver(&endpoints, msg);
    }

    fn num_inlets(&self) -> usize {
        self.inlets.borrow().len()
    }

    fn num_outlets(&self) -> usize {
        self.outlets.borrow().len()
    }
}

impl fmt::Debug for Gadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gadget")
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("inlets", &self.inlets.borrow().len())
            .field("outlets", &*self.outlets.borrow())
            .finish()
    }
}

/// Feed `msg` to each endpoint in order. Endpoints whose gadget is gone are skipped.
pub(crate) fn deliver(endpoints: &[Endpoint], msg: Message) {
    for endpoint in endpoints {
        match endpoint.target() {
            Some(gadget) => gadget.feed(endpoint.inlet, msg.clone()),
            None => trace!(inlet = endpoint.inlet, "skipping endpoint of a dropped gadget"),
        }
    }
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static MAX_DEPTH: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Limit how deeply `feed` calls may nest on the current thread.
///
/// Cyclic wiring recurses without bound by default. With a limit set, going
/// past it panics with a clear message instead of overflowing the stack.
pub fn set_max_depth(limit: Option<usize>) {
    MAX_DEPTH.with(|max| max.set(limit));
}

pub fn max_depth() -> Option<usize> {
    MAX_DEPTH.with(|max| max.get())
}

/// Current nesting of `feed` calls on this thread.
pub fn current_depth() -> usize {
    DEPTH.with(|depth| depth.get())
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        let depth = DEPTH.with(|d| {
            let next = d.get() + 1;
            d.set(next);
            next
        });
        if let Some(limit) = max_depth() {
            if depth > limit {
                DEPTH.with(|d| d.set(d.get() - 1));
                panic!("propagation depth {depth} exceeds the limit of {limit}, is the wiring cyclic?");
            }
        }
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
