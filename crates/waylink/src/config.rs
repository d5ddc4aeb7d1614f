//! Connection configuration.

/// Highest identity a client may allocate. Identities from 0xFF000000 up
/// belong to the server.
pub const MAX_CLIENT_ID: u32 = 0xFEFF_FFFF;

/// Tunables for a [`Display`](crate::Display).
///
/// ```rust
/// use waylink::DisplayConfig;
///
/// let config = DisplayConfig {
///     notice_capacity: 256,
///     ..DisplayConfig::default()
/// };
/// assert_eq!(config.callback_interface, "wl_callback");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Upper bound for client-allocated identities. The allocator wraps
    /// back to 2 after reaching it.
    pub max_client_id: u32,

    /// Interface whose `new_id` arguments turn a request into a
    /// synchronization barrier.
    pub callback_interface: String,

    /// How many warnings and escalated errors a slow
    /// [`notices()`](crate::Display::notices) receiver may fall behind
    /// before it starts missing some.
    pub notice_capacity: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_client_id: MAX_CLIENT_ID,
            callback_interface: waylink_protocol::DEFAULT_CALLBACK_INTERFACE.to_owned(),
            notice_capacity: 64,
        }
    }
}
