//! The debug sink: where `print` gadgets write their lines.
//!
//! The sink is per thread. It defaults to stdout and can be swapped out, which
//! is how tests capture what a circuit printed.
use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};
use tracing::warn;

thread_local! {
    static DEBUG: RefCell<Box<dyn Write>> = RefCell::new(Box::new(io::stdout()));
}

/// Replace the debug sink of the current thread, returning the previous one.
pub fn set_debug_sink(sink: Box<dyn Write>) -> Box<dyn Write> {
    DEBUG.with(|cell| std::mem::replace(&mut *cell.borrow_mut(), sink))
}

/// Write a chunk of text to the debug sink.
///
/// Output failures are logged and otherwise ignored, printing is best effort.
pub fn write_debug(text: &str) {
    DEBUG.with(|cell| {
        let mut sink = cell.borrow_mut();
        if let Err(e) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            warn!(error = %e, "debug sink write failed");
        }
    });
}

/// An in-memory sink that can be read back while it is installed.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures debug output until dropped, then restores the previous sink.
pub struct DebugCapture {
    buffer: SharedBuffer,
    previous: Option<Box<dyn Write>>,
}

impl DebugCapture {
    pub fn contents(&self) -> String {
        self.buffer.contents()
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }
}

impl Drop for DebugCapture {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            set_debug_sink(previous);
        }
    }
}

/// Start capturing the debug output of the current thread.
pub fn capture_debug() -> DebugCapture {
    let buffer = SharedBuffer::default();
    let previous = set_debug_sink(Box::new(buffer.clone()));
    DebugCapture {
        buffer,
        previous: Some(previous),
    }
}
