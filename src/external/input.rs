//! Keyboard and pointer synthesis interface.

/// Pointer buttons understood by the input back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Synthesises key and pointer events.
///
/// Calls are fire-and-forget: a back-end that cannot deliver an event logs it
/// itself, the engine treats every issued primitive as delivered. Methods are
/// synchronous so held keys can be released from a `Drop` guard.
pub trait InputDriver: Send + Sync {
    fn key_down(&self, key: &str);
    fn key_up(&self, key: &str);
    fn key_tap(&self, key: &str);
    fn mouse_move(&self, x: i32, y: i32);
    fn mouse_click(&self, button: MouseButton);
    fn mouse_toggle(&self, button: MouseButton, down: bool);
    fn scroll(&self, amount: i32, direction: ScrollDirection);
    fn cursor_position(&self) -> (i32, i32);
}
