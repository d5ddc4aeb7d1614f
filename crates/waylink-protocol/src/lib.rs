//! Wire protocol for waylink.
//!
//! This crate is the pure, synchronous half of the client: it knows how
//! bytes are laid out but nothing about sockets or live objects.
//!
//! - **Types** ([`Arg`], [`ObjectId`], [`ByteOrder`]): native argument
//!   values and object identities.
//! - **Codec** ([`format_args`], [`get_args`], [`WireCodec`]): arguments
//!   to and from payload bytes, driven entirely by argument definitions.
//! - **Schema** ([`Schema`], [`Interface`], [`InterfaceDefinition`]): what
//!   each interface's requests, events, and enums look like.
//! - **Frames** ([`MessageHeader`], [`FrameDecoder`]): the 8-byte header
//!   and splitting a byte stream into messages.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Frames (object, opcode, payload) → Codec (Vec<Arg>) → Proxy events
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod frame;
mod schema;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{
    fixed_to_word, format_args, format_args_with, get_args, get_args_with, padded_len,
    word_to_fixed, WireCodec,
};
pub use error::ProtocolError;
pub use frame::{encode_frame, Frame, FrameDecoder, MessageHeader, HEADER_LEN, MAX_FRAME_LEN};
pub use schema::{
    ArgType, ArgumentDefinition, EnumEntry, Interface, InterfaceDefinition, MessageDefinition,
    RequestEntry, RequestKind, Schema, DEFAULT_CALLBACK_INTERFACE,
};
pub use types::{Arg, ByteOrder, ObjectId, ObjectLike};
