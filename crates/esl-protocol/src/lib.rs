//! esl-protocol: Wire protocol for the FreeSWITCH event socket
//!
//! This crate defines the line-framed text protocol spoken on the event
//! socket: a block of `Name: value` header lines closed by a blank line,
//! optionally followed by a body whose size is given by `Content-Length`.
//! Inbound frames decode into [`Response`] values; `text/event-plain`
//! bodies decode further into [`Event`] values.

pub mod codec;
pub mod content_type;
pub mod error;
pub mod event;
pub mod names;
pub mod response;

pub use codec::{FrameCodec, MAX_BODY_SIZE, MAX_LINE_LENGTH};
pub use content_type::ContentType;
pub use error::{ProtocolError, ReplyError};
pub use event::Event;
pub use names::{builtin_event_names, is_builtin_event};
pub use response::Response;
