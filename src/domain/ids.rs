//! Type-safe identifiers.
//!
//! Every entity the gateway routes on gets its own newtype around
//! [`uuid::Uuid`] so that a [`UserId`] can never be passed where a
//! [`ChannelId`] is expected. All of them serialize as plain UUID strings.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wraps an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Returns `true` for the all-zero UUID, which is never a valid id.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identity of a user, as asserted by the authenticating layer.
    UserId
);

uuid_id!(
    /// Identity of a text channel. Also names the transport group of
    /// everyone currently viewing it, see [`ChannelId::group_name`].
    ChannelId
);

uuid_id!(
    /// Identity of a server (a collection of channels).
    ServerId
);

uuid_id!(
    /// Identity of a persisted message.
    MessageId
);

uuid_id!(
    /// Identity of a voice/video call session.
    CallId
);

uuid_id!(
    /// One live transport session for a client device or browser tab.
    ///
    /// Generated by the transport when the socket is accepted; a user may
    /// hold many at once.
    ConnectionId
);

impl ChannelId {
    /// Name of the transport group bound to this channel.
    #[must_use]
    pub fn group_name(&self) -> String {
        format!("channel:{}", self.0)
    }
}
