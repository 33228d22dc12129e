use crossterm::event::KeyEvent;

/// All messages that drive state transitions in the update loop.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- System
    /// Periodic poll timeout; drives the copy-feedback revert deadline.
    Tick,
    /// The blocking external editor returned; re-parse and refresh.
    EditorDone,
}
