//! Circuits: gadgets made of other gadgets.
use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};
use tracing::debug;

use crate::{
    gadget::{Gadget, Gadgetry},
    message::Message,
    notifier::Notifier,
    patch::{self, PatchError},
};

/// A recorded connection between two members of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    pub src: usize,
    pub outlet: usize,
    pub dst: usize,
    pub inlet: usize,
}

/// Where a member sits on the patch canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// A composition of gadgets, including sub-circuits.
///
/// The circuit's own inlets are the `inlet` members, in the order they were
/// added, and its outlets are driven by the `outlet` members.
pub struct Circuit {
    ports: Gadget,
    members: RefCell<Vec<Rc<dyn Gadgetry>>>,
    positions: RefCell<Vec<Position>>,
    wires: RefCell<Vec<Wire>>,
    inlets: RefCell<Vec<usize>>,
    notifier: Notifier,
    me: Weak<Circuit>,
}

impl Circuit {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| Circuit {
            ports: Gadget::new("circuit", Message::bang()),
            members: RefCell::new(Vec::new()),
            positions: RefCell::new(Vec::new()),
            wires: RefCell::new(Vec::new()),
            inlets: RefCell::new(Vec::new()),
            notifier: Notifier::new(),
            me: me.clone(),
        })
    }

    /// Construct a circuit from Pd patch text.
    pub fn from_text(text: &str) -> Result<Rc<Self>, PatchError> {
        patch::parse_patch(text)
    }

    /// Add a gadget (or sub-circuit), returning its member index.
    pub fn add(&self, gadget: Rc<dyn Gadgetry>) -> usize {
        self.add_at(gadget, Position::default())
    }

    /// Add a gadget at a canvas position, returning its member index.
    pub fn add_at(&self, gadget: Rc<dyn Gadgetry>, position: Position) -> usize {
        let index = {
            let mut members = self.members.borrow_mut();
            members.push(Rc::clone(&gadget));
            members.len() - 1
        };
        self.positions.borrow_mut().push(position);
        debug!(index, kind = gadget.kind(), "member added");
        gadget.added_to(self, index);
        index
    }

    /// Connect outlet `outlet` of member `src` to inlet `inlet` of member `dst`.
    ///
    /// # Panics
    ///
    /// Panics if either member or port index is out of range.
    pub fn add_wire(&self, src: usize, outlet: usize, dst: usize, inlet: usize) {
        let (from, to) = {
            let members = self.members.borrow();
            (Rc::clone(&members[src]), Rc::clone(&members[dst]))
        };
        from.connect(outlet, &to, inlet);
        self.wires.borrow_mut().push(Wire {
            src,
            outlet,
            dst,
            inlet,
        });
    }

    pub fn member(&self, index: usize) -> Option<Rc<dyn Gadgetry>> {
        self.members.borrow().get(index).cloned()
    }

    pub fn position(&self, index: usize) -> Option<Position> {
        self.positions.borrow().get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    pub fn wires(&self) -> Vec<Wire> {
        self.wires.borrow().clone()
    }

    /// Make member `index` the next external inlet, returning the inlet number.
    pub fn bind_inlet(&self, index: usize) -> usize {
        let mut inlets = self.inlets.borrow_mut();
        inlets.push(index);
        inlets.len() - 1
    }

    /// Allocate external outlets, returning the index of the first one.
    pub fn add_outlets(&self, n: usize) -> usize {
        self.ports.add_outlets(n)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// A non-owning handle to this circuit.
    pub fn downgrade(&self) -> Weak<Circuit> {
        self.me.clone()
    }

    /// Write this circuit back out as Pd patch text.
    pub fn to_text(&self) -> Result<String, PatchError> {
        patch::write_patch(self)
    }
}

impl Gadgetry for Circuit {
    fn kind(&self) -> &str {
        self.ports.kind()
    }

    fn args(&self) -> &Message {
        self.ports.args()
    }

    fn added_to(&self, circuit: &Circuit, index: usize) {
        self.ports.added_to(circuit, index);
    }

    fn connect(&self, outlet: usize, target: &Rc<dyn Gadgetry>, inlet: usize) {
        self.ports.connect(outlet, target, inlet);
    }

    fn feed(&self, inlet: usize, msg: Message) {
        let member = {
            let index = self.inlets.borrow()[inlet];
            Rc::clone(&self.members.borrow()[index])
        };
        member.feed(0, msg);
    }

    fn emit(&self, outlet: usize, msg: Message) {
        self.ports.emit(outlet, msg);
    }

    fn num_inlets(&self) -> usize {
        self.inlets.borrow().len()
    }

    fn num_outlets(&self) -> usize {
        self.ports.num_outlets()
    }

    fn as_circuit(&self) -> Option<&Circuit> {
        Some(self)
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self
            .members
            .borrow()
            .iter()
            .map(|m| m.kind().to_string())
            .collect();
        f.debug_struct("Circuit")
            .field("members", &kinds)
            .field("wires", &*self.wires.borrow())
            .field("inlets", &self.num_inlets())
            .field("outlets", &self.num_outlets())
            .finish()
    }
}
