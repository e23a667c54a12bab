//! Startup queue: buffers items until the counterpart is ready.
//!
//! The buffer is live from construction until the first `drain`, which hands
//! back everything in FIFO order and retires the buffer for good. After that
//! `push` passes items straight through.

#[derive(Debug)]
pub struct StartupQueue<T> {
    buf: Option<Vec<T>>,
}

impl<T> Default for StartupQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StartupQueue<T> {
    pub fn new() -> Self {
        Self { buf: Some(Vec::new()) }
    }

    /// Buffer `item` while active. Returns it back once the queue is retired,
    /// meaning the caller must transmit it directly.
    #[must_use = "a returned item must be transmitted by the caller"]
    pub fn push(&mut self, item: T) -> Option<T> {
        match self.buf.as_mut() {
            Some(buf) => {
                buf.push(item);
                None
            }
            None => Some(item),
        }
    }

    /// Swap the buffer out and retire it. Returns the buffered items in
    /// original order; empty on every call after the first.
    pub fn drain(&mut self) -> Vec<T> {
        self.buf.take().unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.buf.is_some()
    }

    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop buffered items without retiring (teardown).
    pub fn clear(&mut self) {
        if let Some(buf) = self.buf.as_mut() {
            buf.clear();
        }
    }
}
