//! poselib-api-core: channel paths, values and blend math (core, host-agnostic)

pub mod blend;
pub mod channel_path;
pub mod coercion;
pub mod rotation;
pub mod value;

pub use blend::{BlendMode, Neutral};
pub use channel_path::{ChannelError, ChannelKind, ChannelPath};
pub use coercion::CoercionError;
pub use rotation::RotationMode;
pub use value::{Value, ValueKind};
