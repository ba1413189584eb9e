//! The message registry: wire id → (constructor, handler, name).
//!
//! Both peers must register the same message types under the same ids
//! before they exchange them. Registration happens at startup; a duplicate
//! id is an error, never an overwrite.

use std::any::Any;
use std::collections::HashMap;

use salvo_protocol::{NetworkMessage, NetworkReader, ProtocolError, WireTypeId};

use crate::PeerContext;

/// Builds a boxed message from a payload reader.
pub type MessageConstructor =
    fn(&mut NetworkReader<'_>) -> Result<Box<dyn Any + Send>, ProtocolError>;

/// Receives a constructed message. The box always holds the type the
/// handler was registered for.
pub type MessageHandler = Box<dyn FnMut(Box<dyn Any + Send>, &mut PeerContext<'_>) + Send>;

struct MessageMetadata {
    name: &'static str,
    constructor: MessageConstructor,
    handler: MessageHandler,
}

fn construct<M: NetworkMessage>(
    reader: &mut NetworkReader<'_>,
) -> Result<Box<dyn Any + Send>, ProtocolError> {
    Ok(Box::new(M::deserialize(reader)?))
}

fn erase<M, F>(mut handler: F) -> MessageHandler
where
    M: NetworkMessage,
    F: FnMut(M, &mut PeerContext<'_>) + Send + 'static,
{
    Box::new(move |any: Box<dyn Any + Send>, ctx: &mut PeerContext<'_>| match any.downcast::<M>() {
        Ok(message) => handler(*message, ctx),
        Err(_) => tracing::error!(
            id = %M::TYPE_ID,
            message = M::NAME,
            "constructed message has the wrong type, dropping"
        ),
    })
}

/// Maps wire ids to message types and their handlers.
#[derive(Default)]
pub struct MessageRegistry {
    entries: HashMap<WireTypeId, MessageMetadata>,
}

impl MessageRegistry {
    /// Creates an empty registry. [`NetworkPeer`](crate::NetworkPeer)
    /// seeds its own with the built-in messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `M` and `handler` to `M::TYPE_ID`.
    ///
    /// # Errors
    /// [`ProtocolError::RegistrationConflict`] if the id is already taken.
    pub fn register<M, F>(&mut self, handler: F) -> Result<(), ProtocolError>
    where
        M: NetworkMessage,
        F: FnMut(M, &mut PeerContext<'_>) + Send + 'static,
    {
        if let Some(existing) = self.entries.get(&M::TYPE_ID) {
            return Err(ProtocolError::RegistrationConflict {
                id: M::TYPE_ID,
                existing: existing.name,
                new: M::NAME,
            });
        }

        self.entries.insert(
            M::TYPE_ID,
            MessageMetadata {
                name: M::NAME,
                constructor: construct::<M>,
                handler: erase(handler),
            },
        );
        tracing::debug!(id = %M::TYPE_ID, message = M::NAME, "registered message type");
        Ok(())
    }

    /// Whether `id` has been registered.
    pub fn has_type(&self, id: WireTypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// The decoder registered for `id`.
    pub fn constructor(&self, id: WireTypeId) -> Option<MessageConstructor> {
        self.entries.get(&id).map(|entry| entry.constructor)
    }

    /// The handler registered for `id`.
    pub fn handler_mut(&mut self, id: WireTypeId) -> Option<&mut MessageHandler> {
        self.entries.get_mut(&id).map(|entry| &mut entry.handler)
    }

    /// The registered name for `id`, for logs.
    pub fn name_of(&self, id: WireTypeId) -> Option<&'static str> {
        self.entries.get(&id).map(|entry| entry.name)
    }

    /// Number of registered types, built-ins included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered ids, in ascending order.
    pub fn type_ids(&self) -> Vec<WireTypeId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Constructs the message for `id` from `reader` and hands it to its
    /// handler.
    ///
    /// The payload must be consumed exactly: leftover bytes mean the two
    /// peers disagree on the schema, and the handler is not called.
    pub fn dispatch(
        &mut self,
        id: WireTypeId,
        reader: &mut NetworkReader<'_>,
        ctx: &mut PeerContext<'_>,
    ) -> Result<(), ProtocolError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(ProtocolError::UnknownType(id))?;

        let message = (entry.constructor)(reader)?;
        if !reader.is_exhausted() {
            return Err(ProtocolError::TrailingBytes {
                id,
                remaining: reader.remaining(),
            });
        }

        (entry.handler)(message, ctx);
        Ok(())
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<_> = self.entries.iter().map(|(id, e)| (*id, e.name)).collect();
        entries.sort_unstable();
        f.debug_struct("MessageRegistry")
            .field("entries", &entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    use salvo_protocol::{NetworkWriter, SetClientId};
    use salvo_transport::Role;

    use super::*;
    use crate::LockstepState;

    struct Score(i32);

    impl NetworkMessage for Score {
        const TYPE_ID: WireTypeId = WireTypeId(7);
        const NAME: &'static str = "Score";

        fn serialize(&self, w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
            w.write(self.0)
        }

        fn deserialize(r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
            Ok(Self(r.read()?))
        }
    }

    /// Same id as `Score`, different type.
    struct Impostor;

    impl NetworkMessage for Impostor {
        const TYPE_ID: WireTypeId = WireTypeId(7);
        const NAME: &'static str = "Impostor";

        fn serialize(&self, _w: &mut NetworkWriter<'_>) -> Result<(), ProtocolError> {
            Ok(())
        }

        fn deserialize(_r: &mut NetworkReader<'_>) -> Result<Self, ProtocolError> {
            Ok(Self)
        }
    }

    fn dispatch_bytes(
        registry: &mut MessageRegistry,
        id: WireTypeId,
        payload: &[u8],
    ) -> Result<(), ProtocolError> {
        let mut state = LockstepState::new(Role::Server);
        let mut outbox = VecDeque::new();
        let mut ctx = PeerContext::new(&mut state, &mut outbox, Role::Server);
        let mut reader = NetworkReader::new(payload);
        registry.dispatch(id, &mut reader, &mut ctx)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = MessageRegistry::new();
        assert!(registry.is_empty());
        registry.register::<Score, _>(|_, _| {}).unwrap();

        assert!(registry.has_type(Score::TYPE_ID));
        assert!(registry.constructor(Score::TYPE_ID).is_some());
        assert!(registry.handler_mut(Score::TYPE_ID).is_some());
        assert_eq!(registry.name_of(Score::TYPE_ID), Some("Score"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.has_type(WireTypeId(8)));
        assert!(registry.constructor(WireTypeId(8)).is_none());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = MessageRegistry::new();
        registry.register::<Score, _>(|_, _| {}).unwrap();

        let err = registry.register::<Impostor, _>(|_, _| {}).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::RegistrationConflict {
                id: WireTypeId(7),
                existing: "Score",
                new: "Impostor",
            }
        );
        // The original entry survives.
        assert_eq!(registry.name_of(WireTypeId(7)), Some("Score"));
    }

    #[test]
    fn test_dispatch_invokes_handler_with_decoded_message() {
        let seen = Arc::new(AtomicI32::new(0));
        let sink = seen.clone();

        let mut registry = MessageRegistry::new();
        registry
            .register::<Score, _>(move |score, _| sink.store(score.0, Ordering::SeqCst))
            .unwrap();

        dispatch_bytes(&mut registry, Score::TYPE_ID, &42i32.to_le_bytes()).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_dispatch_unknown_id() {
        let mut registry = MessageRegistry::new();
        assert_eq!(
            dispatch_bytes(&mut registry, WireTypeId(99), &[]).unwrap_err(),
            ProtocolError::UnknownType(WireTypeId(99))
        );
    }

    #[test]
    fn test_dispatch_rejects_trailing_bytes() {
        let calls = Arc::new(AtomicI32::new(0));
        let sink = calls.clone();

        let mut registry = MessageRegistry::new();
        registry
            .register::<Score, _>(move |_, _| {
                sink.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let err = dispatch_bytes(&mut registry, Score::TYPE_ID, &[1, 0, 0, 0, 9]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TrailingBytes {
                id: Score::TYPE_ID,
                remaining: 1
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_propagates_decode_errors() {
        let mut registry = MessageRegistry::new();
        registry.register::<SetClientId, _>(|_, _| {}).unwrap();
        assert!(matches!(
            dispatch_bytes(&mut registry, SetClientId::TYPE_ID, &[1, 2]),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_type_ids_sorted() {
        let mut registry = MessageRegistry::new();
        registry.register::<Score, _>(|_, _| {}).unwrap();
        registry.register::<SetClientId, _>(|_, _| {}).unwrap();
        assert_eq!(registry.type_ids(), vec![SetClientId::TYPE_ID, Score::TYPE_ID]);
    }
}
