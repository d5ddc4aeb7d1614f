//! Object proxies: one handle per live protocol object.
//!
//! A [`Proxy`] turns its interface's schema into calls and events:
//!
//! - **Outbound**: [`invoke`](Proxy::invoke) looks the request up in the
//!   interface's request table and issues it according to its
//!   [`RequestKind`]: a barrier, an object creation, or a plain send.
//! - **Inbound**: [`push`](Proxy::push) decodes an event payload and emits
//!   it to the listeners attached with [`on`](Proxy::on),
//!   [`once`](Proxy::once) or [`subscribe`](Proxy::subscribe).
//!
//! Proxies are cheap `Arc` handles. They only hold a weak link to their
//! connection: once the [`Display`](crate::Display) is gone, every call
//! fails with [`WaylinkError::ConnectionClosed`].

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use waylink_protocol::{
    get_args, Arg, Interface, MessageDefinition, ObjectId, ObjectLike, RequestKind,
};

use crate::aggregate::{Aggregation, Snapshot};
use crate::display::Shared;
use crate::events::{
    dispatch, dispatch_error, ClosedSignal, ErrorCallback, Event, EventArg, EventBus,
    EventCallback, EventStream, ListenerId, OnceEvent,
};
use crate::{lock, WaylinkError};

/// Handle to one protocol object.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    id: ObjectId,
    interface: Arc<Interface>,
    version: u32,
    link: Weak<Shared>,
    bus: Mutex<EventBus>,
}

impl Proxy {
    pub(crate) fn new(
        id: ObjectId,
        interface: Arc<Interface>,
        version: u32,
        link: Weak<Shared>,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id,
                interface,
                version,
                link,
                bus: Mutex::new(EventBus::default()),
            }),
        }
    }

    /// A proxy with no connection behind it.
    #[cfg(test)]
    pub(crate) fn detached(id: ObjectId, interface: Arc<Interface>) -> Self {
        let version = interface.version();
        Self::new(id, interface, version, Weak::new())
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Name of the implemented interface.
    pub fn interface(&self) -> &str {
        self.inner.interface.name()
    }

    /// Version this object was created or bound at.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// The interface schema, shared with every object of the same
    /// interface.
    pub fn definition(&self) -> &Arc<Interface> {
        &self.inner.interface
    }

    /// Opcode of the named request.
    pub fn opcode(&self, request: &str) -> Result<u16, WaylinkError> {
        self.inner
            .interface
            .opcode(request)
            .ok_or_else(|| self.unknown_request(request))
    }

    /// Multi-line description of the interface and its requests.
    pub fn describe(&self) -> String {
        self.inner.interface.describe()
    }

    /// Fires when the connection is torn down, or right away when it's gone.
    pub(crate) fn closed_signal(&self) -> ClosedSignal {
        match self.inner.link.upgrade() {
            Some(shared) => shared.torn_down_signal(),
            None => ClosedSignal::closed(),
        }
    }

    fn shared(&self) -> Result<Arc<Shared>, WaylinkError> {
        self.inner.link.upgrade().ok_or(WaylinkError::ConnectionClosed)
    }

    fn unknown_request(&self, request: &str) -> WaylinkError {
        WaylinkError::UnknownRequest {
            interface: self.interface().to_owned(),
            request: request.to_owned(),
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Issues the named request.
    ///
    /// `args` are the declared arguments *after* a leading `new_id`: for
    /// requests that create an object, the identity is allocated here and
    /// prepended.
    ///
    /// - **Barrier** (first argument is a callback `new_id`): sends, waits
    ///   for the callback's event, retires the callback, returns `None`.
    /// - **Creation** (any other typed `new_id`): the new object is
    ///   registered before the request is sent and returned as
    ///   `Some(proxy)`. If the send fails it is unregistered again.
    /// - Anything else: sends and returns `None`.
    pub async fn invoke(&self, request: &str, args: &[Arg]) -> Result<Option<Proxy>, WaylinkError> {
        let schema = Arc::clone(&self.inner.interface);
        let (entry, def) = schema
            .request(request)
            .ok_or_else(|| self.unknown_request(request))?;
        let shared = self.shared()?;

        match &entry.kind {
            RequestKind::Callback { interface } => {
                self.roundtrip(&shared, interface, entry.opcode, def, args)
                    .await?;
                Ok(None)
            }
            RequestKind::Create { interface } => {
                let created = self
                    .create_via(&shared, interface, entry.opcode, def, args)
                    .await?;
                Ok(Some(created))
            }
            RequestKind::Plain => {
                shared.request(self.id(), entry.opcode, def, args).await?;
                Ok(None)
            }
        }
    }

    /// Issues a request that doesn't create an object (or whose created
    /// object the caller doesn't need).
    pub async fn request(&self, request: &str, args: &[Arg]) -> Result<(), WaylinkError> {
        self.invoke(request, args).await.map(|_| ())
    }

    /// Issues an object-creating request and returns the new object.
    ///
    /// # Errors
    /// [`WaylinkError::NotACreationRequest`] if the request's first
    /// argument isn't a typed `new_id` (checked before sending).
    pub async fn create(&self, request: &str, args: &[Arg]) -> Result<Proxy, WaylinkError> {
        let creates = matches!(
            self.inner.interface.request(request),
            Some((entry, _)) if matches!(entry.kind, RequestKind::Create { .. })
        );
        if !creates {
            if self.inner.interface.opcode(request).is_none() {
                return Err(self.unknown_request(request));
            }
            return Err(WaylinkError::NotACreationRequest {
                interface: self.interface().to_owned(),
                request: request.to_owned(),
            });
        }
        self.invoke(request, args)
            .await?
            .ok_or(WaylinkError::ConnectionClosed)
    }

    async fn roundtrip(
        &self,
        shared: &Arc<Shared>,
        callback_interface: &str,
        opcode: u16,
        def: &MessageDefinition,
        args: &[Arg],
    ) -> Result<(), WaylinkError> {
        let callback = shared.create(callback_interface, None)?;
        let event = callback
            .definition()
            .events()
            .first()
            .map(|e| e.name.clone())
            .ok_or_else(|| {
                waylink_protocol::ProtocolError::Schema(format!(
                    "callback interface {callback_interface} declares no event"
                ))
            });
        let event = match event {
            Ok(name) => name,
            Err(e) => {
                shared.delete_id(callback.id());
                return Err(e.into());
            }
        };
        // Attach before sending so the reply can't race past us.
        let done = callback.once(&event);

        let full = with_new_id(callback.id(), args);
        if let Err(e) = shared.request(self.id(), opcode, def, &full).await {
            shared.delete_id(callback.id());
            return Err(e);
        }
        let result = done.await;
        shared.delete_id(callback.id());
        result.map(|_| ())
    }

    async fn create_via(
        &self,
        shared: &Arc<Shared>,
        interface: &str,
        opcode: u16,
        def: &MessageDefinition,
        args: &[Arg],
    ) -> Result<Proxy, WaylinkError> {
        let created = shared.create(interface, None)?;
        let full = with_new_id(created.id(), args);
        match shared.request(self.id(), opcode, def, &full).await {
            Ok(()) => Ok(created),
            Err(source) => {
                shared.delete_id(created.id());
                Err(WaylinkError::Request {
                    interface: self.interface().to_owned(),
                    request: def.name.clone(),
                    args: def
                        .args
                        .iter()
                        .map(|a| a.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    source: Box::new(source),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Decodes and emits one inbound event.
    ///
    /// An unknown opcode is reported as a warning on the connection. Decode
    /// failures go to this object's error listeners, or to the connection
    /// if it has none.
    pub fn push(&self, opcode: u16, payload: &[u8]) {
        let Some(def) = self.inner.interface.event(opcode) else {
            let err = WaylinkError::UnknownOpcode {
                interface: self.interface().to_owned(),
                opcode,
            };
            tracing::warn!(object = self.id().get(), error = %err, "dropping event");
            if let Ok(shared) = self.shared() {
                shared.warn(err);
            }
            return;
        };
        match self.decode_event(opcode, def, payload) {
            Ok(event) => self.emit(&event),
            Err(e) => self.emit_error(e),
        }
    }

    fn decode_event(
        &self,
        opcode: u16,
        def: &MessageDefinition,
        payload: &[u8],
    ) -> Result<Event, WaylinkError> {
        let values = get_args(payload, &def.args)?;
        let announced = def.args.first().and_then(|a| a.created_interface());
        if announced.is_some() && values.len() > 1 {
            tracing::warn!(
                interface = self.interface(),
                event = %def.name,
                "object-creating event carries extra arguments"
            );
        }

        let mut args = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let arg = match (index, announced, value) {
                (0, Some(interface), Arg::NewId(id)) => {
                    let shared = self.shared()?;
                    EventArg::Object(shared.register(ObjectId(id), interface, None)?)
                }
                (_, _, value) => EventArg::Value(value),
            };
            args.push(arg);
        }

        tracing::trace!(object = self.id().get(), event = %def.name, "event");
        Ok(Event {
            sender: self.id(),
            opcode,
            name: def.name.clone(),
            args,
        })
    }

    /// Runs every listener attached for `event.name`.
    pub(crate) fn emit(&self, event: &Event) {
        let callbacks = lock(&self.inner.bus).matching(&event.name);
        dispatch(&callbacks, event);
    }

    /// Routes an error to this object's error listeners, or escalates it to
    /// the connection if there are none.
    pub(crate) fn emit_error(&self, error: WaylinkError) {
        let callbacks = lock(&self.inner.bus).error_callbacks();
        if callbacks.is_empty() {
            match self.shared() {
                Ok(shared) => shared.escalate(error),
                Err(_) => tracing::error!(object = self.id().get(), error = %error, "unhandled error"),
            }
        } else {
            dispatch_error(&callbacks, &error);
        }
    }

    pub(crate) fn attach<F>(&self, event: Option<String>, f: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        if let Some(name) = &event {
            let declared = self.inner.interface.events().iter().any(|e| &e.name == name);
            if !declared {
                tracing::debug!(interface = self.interface(), event = %name, "listening for an undeclared event");
            }
        }
        let callback: EventCallback = Arc::new(Mutex::new(f));
        lock(&self.inner.bus).add(event, callback)
    }

    /// Calls `f` for every `event` this object emits.
    pub fn on<F>(&self, event: &str, f: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.attach(Some(event.to_owned()), f)
    }

    /// Calls `f` for every event, whatever its name.
    pub fn on_any<F>(&self, f: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.attach(None, f)
    }

    /// Calls `f` for decode errors on this object's events. While any
    /// error listener is attached, such errors are no longer escalated to
    /// the connection.
    pub fn on_error<F>(&self, f: F) -> ListenerId
    where
        F: FnMut(&WaylinkError) + Send + 'static,
    {
        let callback: ErrorCallback = Arc::new(Mutex::new(f));
        lock(&self.inner.bus).add_error(callback)
    }

    /// Detaches a listener. Returns `false` if it wasn't attached.
    pub fn off(&self, id: ListenerId) -> bool {
        lock(&self.inner.bus).remove(id)
    }

    /// Resolves with the next `event`.
    pub fn once(&self, event: &str) -> OnceEvent {
        OnceEvent::attach(self, Some(event.to_owned()))
    }

    /// Stream of every event from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::attach(self)
    }

    /// Number of listeners that would receive `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        lock(&self.inner.bus).count(event)
    }

    pub fn error_listener_count(&self) -> usize {
        lock(&self.inner.bus).error_count()
    }

    pub(crate) fn clear_listeners(&self) {
        lock(&self.inner.bus).clear();
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Starts recording every event this object emits.
    ///
    /// Call [`Aggregation::finish`] to detach and collect the snapshot.
    pub fn aggregate(&self) -> Aggregation {
        Aggregation::attach(self)
    }

    /// Records events until the next synchronization barrier completes.
    ///
    /// This is how to read an object's state: everything the server sends
    /// in response to a bind arrives before the barrier's reply.
    pub async fn drain(&self) -> Result<Snapshot, WaylinkError> {
        let aggregation = self.aggregate();
        self.shared()?.sync().await?;
        Ok(aggregation.finish())
    }

    /// Records events until `until` completes.
    pub async fn drain_until<F: Future>(&self, until: F) -> Snapshot {
        let aggregation = self.aggregate();
        until.await;
        aggregation.finish()
    }
}

fn with_new_id(id: ObjectId, args: &[Arg]) -> Vec<Arg> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(Arg::NewId(id.get()));
    full.extend_from_slice(args);
    full
}

impl ObjectLike for Proxy {
    fn object_id(&self) -> ObjectId {
        self.id()
    }
}

impl From<&Proxy> for Arg {
    fn from(proxy: &Proxy) -> Self {
        Arg::object(proxy)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.id())
            .field("interface", &self.interface())
            .field("version", &self.version())
            .finish()
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.interface(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use waylink_protocol::{
        format_args, ArgType, ArgumentDefinition, InterfaceDefinition, MessageDefinition,
        DEFAULT_CALLBACK_INTERFACE,
    };

    use super::*;

    fn counter() -> Arc<Interface> {
        let mut def = InterfaceDefinition::new("wl_counter", 2);
        def.requests.push(MessageDefinition::new(
            "set",
            vec![ArgumentDefinition::new("value", ArgType::Uint)],
        ));
        def.events.push(MessageDefinition::new(
            "changed",
            vec![ArgumentDefinition::new("value", ArgType::Uint)],
        ));
        Arc::new(Interface::new(def, DEFAULT_CALLBACK_INTERFACE))
    }

    #[test]
    fn test_proxy_accessors() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        assert_eq!(proxy.id(), ObjectId(4));
        assert_eq!(proxy.interface(), "wl_counter");
        assert_eq!(proxy.version(), 2);
        assert_eq!(proxy.to_string(), "wl_counter@4");
        assert_eq!(Arg::from(&proxy), Arg::Object(4));
    }

    #[test]
    fn test_opcode_unknown_request_returns_error() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        assert_eq!(proxy.opcode("set").unwrap(), 0);
        let err = proxy.opcode("reset").unwrap_err();
        assert_eq!(err.to_string(), "no operation named reset in interface wl_counter");
    }

    #[test]
    fn test_push_emits_decoded_event() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        proxy.on("changed", move |e| sink.lock().unwrap().push(e.u32(0)));

        let payload = format_args(&[Arg::Uint(12)], &counter().events()[0].args).unwrap();
        proxy.push(0, &payload);
        assert_eq!(*seen.lock().unwrap(), [Some(12)]);
    }

    #[test]
    fn test_push_decode_error_goes_to_error_listener() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let errors = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&errors);
        proxy.on_error(move |e| {
            assert!(matches!(e, WaylinkError::Protocol(_)));
            *sink.lock().unwrap() += 1;
        });

        proxy.push(0, &[1, 2]);
        assert_eq!(*errors.lock().unwrap(), 1);
    }

    #[test]
    fn test_off_detaches_listener() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let id = proxy.on("changed", |_| {});
        assert_eq!(proxy.listener_count("changed"), 1);
        assert!(proxy.off(id));
        assert_eq!(proxy.listener_count("changed"), 0);
    }

    #[tokio::test]
    async fn test_once_resolves_with_next_event() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let next = proxy.once("changed");
        assert_eq!(proxy.listener_count("changed"), 1);

        let payload = format_args(&[Arg::Uint(3)], &counter().events()[0].args).unwrap();
        proxy.push(0, &payload);
        let event = next.await.unwrap();
        assert_eq!(event.u32(0), Some(3));
        assert_eq!(proxy.listener_count("changed"), 0);
    }

    #[tokio::test]
    async fn test_once_after_clear_returns_connection_closed() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let next = proxy.once("changed");
        proxy.clear_listeners();
        assert!(matches!(next.await, Err(WaylinkError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_request_without_connection_fails() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let err = proxy.request("set", &[Arg::Uint(1)]).await.unwrap_err();
        assert!(matches!(err, WaylinkError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_create_on_plain_request_rejected() {
        let proxy = Proxy::detached(ObjectId(4), counter());
        let err = proxy.create("set", &[Arg::Uint(1)]).await.unwrap_err();
        assert!(matches!(err, WaylinkError::NotACreationRequest { .. }));
    }
}
