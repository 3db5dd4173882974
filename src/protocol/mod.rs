//! # Device Protocol Adapter
//!
//! Everything that knows what travels over the wire between us and the fan lives
//! in this module. Nothing in here touches a socket: the transport hands raw
//! payloads in and takes encoded envelopes out.
//!
//! ## Module Architecture
//!
//! ```text
//! protocol/
//! ├── units.rs        - Device temperature scale <-> Fahrenheit
//! ├── credentials.rs  - Password hash expected by the device broker
//! ├── envelope.rs     - CommandEnvelope, MessageKind and the codec
//! ├── states.rs       - FanState, ProductState, EnvironmentState, DeviceCredentials
//! ├── decoder.rs      - Structural and diff decoding of device payloads
//! ├── dispatcher.rs   - Classifies inbound envelopes, feeds the result channel
//! ├── commands.rs     - Outbound command builders
//! └── error.rs        - DecodeError / EncodeError
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! FanState ──► commands ──► CommandEnvelope::encode ──► transport publish
//!
//! transport delivery ──► MessageDispatcher ──► decoder ──► mpsc<DecodeResult>
//! ```
//!
//! All device values stay strings. The fan uses `"ON"`/`"OFF"`, zero padded
//! numbers and the `STET` keyword interchangeably, and echoing a value back has
//! to reproduce it byte for byte.

pub mod commands;
pub mod credentials;
pub mod decoder;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod states;
pub mod units;

pub use commands::{
    bootstrap_sequence, build_authorise_user, build_close_access_point, build_join_network,
    build_request_current_state, build_set_state,
};
pub use credentials::hash_password;
pub use dispatcher::{DecodeResult, DeviceMessage, MessageDispatcher};
pub use envelope::{CommandEnvelope, MessageKind};
pub use error::{DecodeError, EncodeError};
pub use states::{DeviceCredentials, EnvironmentState, FanState, ProductState};
