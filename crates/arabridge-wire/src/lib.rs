//! Wire format for the arabridge cross-process plug-in protocol.
//!
//! - [`MessageEncoder`] / [`MessageDecoder`]: keyed argument marshalling over a [`Message`]
//! - [`codec`]: per-type encode/decode rules (compound and versioned structs, arrays,
//!   optional members, raw bytes)
//! - [`payload`]: the data shapes exchanged by host and plug-in
//! - [`frame`]: one message plus its id as a single binary frame
//!
//! ## Usage
//!
//! ```
//! use arabridge_wire::codec::{Decode, Encode};
//! use arabridge_wire::payload::ContentTimeRange;
//! use arabridge_wire::{MessageDecoder, MessageEncoder};
//!
//! let range = ContentTimeRange { start: 1.0, duration: 2.5 };
//! let mut encoder = MessageEncoder::new();
//! range.encode(0, &mut encoder);
//!
//! let decoder = MessageDecoder::from(encoder);
//! assert_eq!(ContentTimeRange::decode(0, &decoder), Some(range));
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;

pub use codec::{decode_required, Decode, Encode, RawBytes};
pub use error::{Result, WireError};
pub use frame::{decode_frame, encode_frame, MAX_FRAME_SIZE};
pub use message::{keys, ArgKey, Message, MessageDecoder, MessageEncoder, MessageId, Value};
