//! Domain events published after a state change is committed.
//!
//! Every producer emits a [`DomainEvent`] through the [`super::EventBus`].
//! Local listeners subscribe by [`EventKind`]; the kinds for which
//! [`EventKind::is_transport_bound`] holds are additionally handed to the
//! [`crate::dispatch::EventDispatcher`] for network fanout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CallId, ChannelId, MessageId, ServerId, UserId};
use crate::error::GatewayError;

/// Self-reported presence of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Available.
    Online,
    /// Idle or away from keyboard.
    Away,
    /// Online but suppressing notifications.
    DoNotDisturb,
    /// Online but shown as offline to others.
    Invisible,
}

/// Discriminant of a [`DomainEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// See [`DomainEvent::MessageReceived`].
    MessageReceived,
    /// See [`DomainEvent::MessageUpdated`].
    MessageUpdated,
    /// See [`DomainEvent::MessageDeleted`].
    MessageDeleted,
    /// See [`DomainEvent::TypingStarted`].
    TypingStarted,
    /// See [`DomainEvent::TypingStopped`].
    TypingStopped,
    /// See [`DomainEvent::DirectTypingStarted`].
    DirectTypingStarted,
    /// See [`DomainEvent::PresenceChanged`].
    PresenceChanged,
    /// See [`DomainEvent::OnlineStateChanged`].
    OnlineStateChanged,
    /// See [`DomainEvent::ContactRequestReceived`].
    ContactRequestReceived,
    /// See [`DomainEvent::ContactRequestAccepted`].
    ContactRequestAccepted,
    /// See [`DomainEvent::ChannelCreated`].
    ChannelCreated,
    /// See [`DomainEvent::ChannelUpdated`].
    ChannelUpdated,
    /// See [`DomainEvent::ChannelDeleted`].
    ChannelDeleted,
    /// See [`DomainEvent::ServerUpdated`].
    ServerUpdated,
    /// See [`DomainEvent::ServerDeleted`].
    ServerDeleted,
    /// See [`DomainEvent::MemberJoined`].
    MemberJoined,
    /// See [`DomainEvent::MemberLeft`].
    MemberLeft,
    /// See [`DomainEvent::CallStarted`].
    CallStarted,
    /// See [`DomainEvent::CallEnded`].
    CallEnded,
    /// See [`DomainEvent::ReactionAdded`].
    ReactionAdded,
    /// See [`DomainEvent::ReactionRemoved`].
    ReactionRemoved,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::MessageReceived,
        Self::MessageUpdated,
        Self::MessageDeleted,
        Self::TypingStarted,
        Self::TypingStopped,
        Self::DirectTypingStarted,
        Self::PresenceChanged,
        Self::OnlineStateChanged,
        Self::ContactRequestReceived,
        Self::ContactRequestAccepted,
        Self::ChannelCreated,
        Self::ChannelUpdated,
        Self::ChannelDeleted,
        Self::ServerUpdated,
        Self::ServerDeleted,
        Self::MemberJoined,
        Self::MemberLeft,
        Self::CallStarted,
        Self::CallEnded,
        Self::ReactionAdded,
        Self::ReactionRemoved,
    ];

    /// Returns `true` for kinds the dispatcher fans out over the transport.
    #[must_use]
    pub const fn is_transport_bound(self) -> bool {
        match self {
            Self::MessageReceived
            | Self::TypingStarted
            | Self::TypingStopped
            | Self::DirectTypingStarted
            | Self::PresenceChanged
            | Self::OnlineStateChanged => true,
            Self::MessageUpdated
            | Self::MessageDeleted
            | Self::ContactRequestReceived
            | Self::ContactRequestAccepted
            | Self::ChannelCreated
            | Self::ChannelUpdated
            | Self::ChannelDeleted
            | Self::ServerUpdated
            | Self::ServerDeleted
            | Self::MemberJoined
            | Self::MemberLeft
            | Self::CallStarted
            | Self::CallEnded
            | Self::ReactionAdded
            | Self::ReactionRemoved => false,
        }
    }

    /// Wire name, identical to the `event_type` tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
            Self::MessageUpdated => "message_updated",
            Self::MessageDeleted => "message_deleted",
            Self::TypingStarted => "typing_started",
            Self::TypingStopped => "typing_stopped",
            Self::DirectTypingStarted => "direct_typing_started",
            Self::PresenceChanged => "presence_changed",
            Self::OnlineStateChanged => "online_state_changed",
            Self::ContactRequestReceived => "contact_request_received",
            Self::ContactRequestAccepted => "contact_request_accepted",
            Self::ChannelCreated => "channel_created",
            Self::ChannelUpdated => "channel_updated",
            Self::ChannelDeleted => "channel_deleted",
            Self::ServerUpdated => "server_updated",
            Self::ServerDeleted => "server_deleted",
            Self::MemberJoined => "member_joined",
            Self::MemberLeft => "member_left",
            Self::CallStarted => "call_started",
            Self::CallEnded => "call_ended",
            Self::ReactionAdded => "reaction_added",
            Self::ReactionRemoved => "reaction_removed",
        }
    }
}

/// Domain event emitted after every committed state change.
///
/// Message bodies and other product payloads are carried as opaque JSON
/// and forwarded to clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A message was posted to a channel.
    MessageReceived {
        /// Channel the message was posted to.
        channel_id: ChannelId,
        /// Persisted message id.
        message_id: MessageId,
        /// Author of the message.
        author_id: UserId,
        /// Opaque message body.
        message: serde_json::Value,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A message was edited.
    MessageUpdated {
        /// Channel containing the message.
        channel_id: ChannelId,
        /// Edited message id.
        message_id: MessageId,
        /// Opaque updated body.
        message: serde_json::Value,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A message was deleted.
    MessageDeleted {
        /// Channel containing the message.
        channel_id: ChannelId,
        /// Deleted message id.
        message_id: MessageId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user started typing in a channel.
    TypingStarted {
        /// Channel being typed in.
        channel_id: ChannelId,
        /// User who is typing.
        user_id: UserId,
        /// Signal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user stopped typing in a channel.
    TypingStopped {
        /// Channel that was being typed in.
        channel_id: ChannelId,
        /// User who stopped.
        user_id: UserId,
        /// Signal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user started typing in a direct conversation.
    DirectTypingStarted {
        /// User who is typing.
        user_id: UserId,
        /// The other side of the conversation.
        recipient_id: UserId,
        /// Signal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user changed their presence status.
    PresenceChanged {
        /// User whose presence changed.
        user_id: UserId,
        /// New status.
        status: PresenceStatus,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user gained their first or lost their last connection.
    OnlineStateChanged {
        /// User whose reachability changed.
        user_id: UserId,
        /// `true` when the user came online.
        online: bool,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A contact request was sent.
    ContactRequestReceived {
        /// Requesting user.
        from_user_id: UserId,
        /// Requested user.
        to_user_id: UserId,
        /// Request timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A contact request was accepted.
    ContactRequestAccepted {
        /// Original requester.
        from_user_id: UserId,
        /// User who accepted.
        to_user_id: UserId,
        /// Acceptance timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A channel was created on a server.
    ChannelCreated {
        /// Owning server.
        server_id: ServerId,
        /// New channel.
        channel_id: ChannelId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A channel's settings changed.
    ChannelUpdated {
        /// Owning server.
        server_id: ServerId,
        /// Updated channel.
        channel_id: ChannelId,
        /// Update timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A channel was deleted.
    ChannelDeleted {
        /// Owning server.
        server_id: ServerId,
        /// Deleted channel.
        channel_id: ChannelId,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A server's settings changed.
    ServerUpdated {
        /// Updated server.
        server_id: ServerId,
        /// Update timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A server was deleted.
    ServerDeleted {
        /// Deleted server.
        server_id: ServerId,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user joined a server.
    MemberJoined {
        /// Joined server.
        server_id: ServerId,
        /// New member.
        user_id: UserId,
        /// Join timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user left or was removed from a server.
    MemberLeft {
        /// Server that was left.
        server_id: ServerId,
        /// Former member.
        user_id: UserId,
        /// Leave timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A call started in a channel.
    CallStarted {
        /// Channel hosting the call.
        channel_id: ChannelId,
        /// Call session id.
        call_id: CallId,
        /// User who started the call.
        initiator_id: UserId,
        /// Start timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A call ended.
    CallEnded {
        /// Channel that hosted the call.
        channel_id: ChannelId,
        /// Call session id.
        call_id: CallId,
        /// End timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A reaction was added to a message.
    ReactionAdded {
        /// Channel containing the message.
        channel_id: ChannelId,
        /// Reacted-to message.
        message_id: MessageId,
        /// Reacting user.
        user_id: UserId,
        /// Reaction emoji.
        emoji: String,
        /// Reaction timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A reaction was removed from a message.
    ReactionRemoved {
        /// Channel containing the message.
        channel_id: ChannelId,
        /// Reacted-to message.
        message_id: MessageId,
        /// User whose reaction was removed.
        user_id: UserId,
        /// Reaction emoji.
        emoji: String,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Returns the discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived { .. } => EventKind::MessageReceived,
            Self::MessageUpdated { .. } => EventKind::MessageUpdated,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::TypingStarted { .. } => EventKind::TypingStarted,
            Self::TypingStopped { .. } => EventKind::TypingStopped,
            Self::DirectTypingStarted { .. } => EventKind::DirectTypingStarted,
            Self::PresenceChanged { .. } => EventKind::PresenceChanged,
            Self::OnlineStateChanged { .. } => EventKind::OnlineStateChanged,
            Self::ContactRequestReceived { .. } => EventKind::ContactRequestReceived,
            Self::ContactRequestAccepted { .. } => EventKind::ContactRequestAccepted,
            Self::ChannelCreated { .. } => EventKind::ChannelCreated,
            Self::ChannelUpdated { .. } => EventKind::ChannelUpdated,
            Self::ChannelDeleted { .. } => EventKind::ChannelDeleted,
            Self::ServerUpdated { .. } => EventKind::ServerUpdated,
            Self::ServerDeleted { .. } => EventKind::ServerDeleted,
            Self::MemberJoined { .. } => EventKind::MemberJoined,
            Self::MemberLeft { .. } => EventKind::MemberLeft,
            Self::CallStarted { .. } => EventKind::CallStarted,
            Self::CallEnded { .. } => EventKind::CallEnded,
            Self::ReactionAdded { .. } => EventKind::ReactionAdded,
            Self::ReactionRemoved { .. } => EventKind::ReactionRemoved,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the channel this event is scoped to, if any.
    #[must_use]
    pub const fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Self::MessageReceived { channel_id, .. }
            | Self::MessageUpdated { channel_id, .. }
            | Self::MessageDeleted { channel_id, .. }
            | Self::TypingStarted { channel_id, .. }
            | Self::TypingStopped { channel_id, .. }
            | Self::ChannelCreated { channel_id, .. }
            | Self::ChannelUpdated { channel_id, .. }
            | Self::ChannelDeleted { channel_id, .. }
            | Self::CallStarted { channel_id, .. }
            | Self::CallEnded { channel_id, .. }
            | Self::ReactionAdded { channel_id, .. }
            | Self::ReactionRemoved { channel_id, .. } => Some(*channel_id),
            Self::DirectTypingStarted { .. }
            | Self::PresenceChanged { .. }
            | Self::OnlineStateChanged { .. }
            | Self::ContactRequestReceived { .. }
            | Self::ContactRequestAccepted { .. }
            | Self::ServerUpdated { .. }
            | Self::ServerDeleted { .. }
            | Self::MemberJoined { .. }
            | Self::MemberLeft { .. } => None,
        }
    }

    /// Rejects events that could never have come from a committed change.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] when an identifier is the nil
    /// UUID, a message body is `null`, a reaction emoji is blank, or an
    /// event names the same user on both sides.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let nil = |field: &str| {
            Err(GatewayError::InvalidEvent(format!(
                "{}: {field} must not be nil",
                self.event_type_str()
            )))
        };

        match self {
            Self::MessageReceived {
                channel_id,
                message_id,
                author_id,
                message,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if message_id.is_nil() {
                    return nil("message_id");
                }
                if author_id.is_nil() {
                    return nil("author_id");
                }
                if message.is_null() {
                    return Err(GatewayError::InvalidEvent(
                        "message_received: message body is empty".to_string(),
                    ));
                }
            }
            Self::MessageUpdated {
                channel_id,
                message_id,
                ..
            }
            | Self::MessageDeleted {
                channel_id,
                message_id,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if message_id.is_nil() {
                    return nil("message_id");
                }
            }
            Self::TypingStarted {
                channel_id,
                user_id,
                ..
            }
            | Self::TypingStopped {
                channel_id,
                user_id,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if user_id.is_nil() {
                    return nil("user_id");
                }
            }
            Self::DirectTypingStarted {
                user_id,
                recipient_id,
                ..
            } => {
                if user_id.is_nil() {
                    return nil("user_id");
                }
                if recipient_id.is_nil() {
                    return nil("recipient_id");
                }
                if user_id == recipient_id {
                    return Err(GatewayError::InvalidEvent(
                        "direct_typing_started: user cannot type to themselves".to_string(),
                    ));
                }
            }
            Self::PresenceChanged { user_id, .. } | Self::OnlineStateChanged { user_id, .. } => {
                if user_id.is_nil() {
                    return nil("user_id");
                }
            }
            Self::ContactRequestReceived {
                from_user_id,
                to_user_id,
                ..
            }
            | Self::ContactRequestAccepted {
                from_user_id,
                to_user_id,
                ..
            } => {
                if from_user_id.is_nil() {
                    return nil("from_user_id");
                }
                if to_user_id.is_nil() {
                    return nil("to_user_id");
                }
                if from_user_id == to_user_id {
                    return Err(GatewayError::InvalidEvent(format!(
                        "{}: a user cannot be their own contact",
                        self.event_type_str()
                    )));
                }
            }
            Self::ChannelCreated {
                server_id,
                channel_id,
                ..
            }
            | Self::ChannelUpdated {
                server_id,
                channel_id,
                ..
            }
            | Self::ChannelDeleted {
                server_id,
                channel_id,
                ..
            } => {
                if server_id.is_nil() {
                    return nil("server_id");
                }
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
            }
            Self::ServerUpdated { server_id, .. } | Self::ServerDeleted { server_id, .. } => {
                if server_id.is_nil() {
                    return nil("server_id");
                }
            }
            Self::MemberJoined {
                server_id, user_id, ..
            }
            | Self::MemberLeft {
                server_id, user_id, ..
            } => {
                if server_id.is_nil() {
                    return nil("server_id");
                }
                if user_id.is_nil() {
                    return nil("user_id");
                }
            }
            Self::CallStarted {
                channel_id,
                call_id,
                initiator_id,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if call_id.is_nil() {
                    return nil("call_id");
                }
                if initiator_id.is_nil() {
                    return nil("initiator_id");
                }
            }
            Self::CallEnded {
                channel_id,
                call_id,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if call_id.is_nil() {
                    return nil("call_id");
                }
            }
            Self::ReactionAdded {
                channel_id,
                message_id,
                user_id,
                emoji,
                ..
            }
            | Self::ReactionRemoved {
                channel_id,
                message_id,
                user_id,
                emoji,
                ..
            } => {
                if channel_id.is_nil() {
                    return nil("channel_id");
                }
                if message_id.is_nil() {
                    return nil("message_id");
                }
                if user_id.is_nil() {
                    return nil("user_id");
                }
                if emoji.trim().is_empty() {
                    return Err(GatewayError::InvalidEvent(format!(
                        "{}: emoji must not be blank",
                        self.event_type_str()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn message(channel_id: ChannelId) -> DomainEvent {
        DomainEvent::MessageReceived {
            channel_id,
            message_id: MessageId::new(),
            author_id: UserId::new(),
            message: serde_json::json!({ "content": "hello" }),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn kind_and_type_string_agree() {
        let event = message(ChannelId::new());
        assert_eq!(event.kind(), EventKind::MessageReceived);
        assert_eq!(event.event_type_str(), "message_received");
    }

    #[test]
    fn kind_strings_match_serde_names() {
        for kind in EventKind::ALL {
            let Ok(json) = serde_json::to_string(&kind) else {
                panic!("serialization failed");
            };
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn transport_bound_set_is_exact() {
        let bound: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|kind| kind.is_transport_bound())
            .collect();
        assert_eq!(
            bound,
            vec![
                EventKind::MessageReceived,
                EventKind::TypingStarted,
                EventKind::TypingStopped,
                EventKind::DirectTypingStarted,
                EventKind::PresenceChanged,
                EventKind::OnlineStateChanged,
            ]
        );
    }

    #[test]
    fn serializes_with_event_type_tag() {
        let Ok(json) = serde_json::to_value(message(ChannelId::new())) else {
            panic!("serialization failed");
        };
        assert_eq!(json["event_type"], "message_received");
        assert_eq!(json["message"]["content"], "hello");
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let user = UserId::new();
        let raw = serde_json::json!({
            "event_type": "presence_changed",
            "user_id": user,
            "status": "do_not_disturb",
            "timestamp": Utc::now(),
        });
        let Ok(event) = serde_json::from_value::<DomainEvent>(raw) else {
            panic!("deserialization failed");
        };
        let DomainEvent::PresenceChanged { user_id, status, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(user_id, user);
        assert_eq!(status, PresenceStatus::DoNotDisturb);
    }

    #[test]
    fn channel_scope() {
        let channel = ChannelId::new();
        assert_eq!(message(channel).channel_id(), Some(channel));
        let presence = DomainEvent::OnlineStateChanged {
            user_id: UserId::new(),
            online: true,
            timestamp: Utc::now(),
        };
        assert_eq!(presence.channel_id(), None);
    }

    #[test]
    fn valid_event_passes() {
        assert!(message(ChannelId::new()).validate().is_ok());
    }

    #[test]
    fn nil_ids_are_rejected() {
        let event = message(ChannelId::from_uuid(uuid::Uuid::nil()));
        let Err(GatewayError::InvalidEvent(reason)) = event.validate() else {
            panic!("expected InvalidEvent");
        };
        assert!(reason.contains("channel_id"));
    }

    #[test]
    fn empty_message_body_is_rejected() {
        let event = DomainEvent::MessageReceived {
            channel_id: ChannelId::new(),
            message_id: MessageId::new(),
            author_id: UserId::new(),
            message: serde_json::Value::Null,
            timestamp: Utc::now(),
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn self_directed_typing_is_rejected() {
        let user = UserId::new();
        let event = DomainEvent::DirectTypingStarted {
            user_id: user,
            recipient_id: user,
            timestamp: Utc::now(),
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn blank_emoji_is_rejected() {
        let event = DomainEvent::ReactionAdded {
            channel_id: ChannelId::new(),
            message_id: MessageId::new(),
            user_id: UserId::new(),
            emoji: "  ".to_string(),
            timestamp: Utc::now(),
        };
        assert!(event.validate().is_err());
    }
}
