//! `Display`: one connection to a compositor, its objects, and its schema.
//!
//! This is the entry point of waylink. It ties the layers together:
//! transport (bytes) → frames → registry → proxies.
//!
//! ```text
//!            ┌────────────── Display ───────────────┐
//! request ──▶│ encode → frame → StreamConnection    │──▶ socket
//!            │                                      │
//!   events ◀─│ Proxy::push ◀ registry ◀ frame pump  │◀── socket
//!            └──────────────────────────────────────┘
//! ```
//!
//! The frame pump runs on its own task, started when the `Display` is
//! built. Requests are written from whichever task calls them; the
//! connection serializes the writes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use waylink_protocol::{
    encode_frame, format_args, Arg, ByteOrder, Interface, MessageDefinition, ObjectId,
    Schema,
};
use waylink_transport::{Connection, ConnectionId, StreamConnection};
#[cfg(unix)]
use waylink_transport::{Transport, UnixTransport};

use crate::events::{ClosedSignal, Event};
use crate::registry::ObjectRegistry;
use crate::{lock, pump, DisplayConfig, Proxy, WaylinkError};

/// Conventional identity of the registry created during bootstrap.
pub const REGISTRY_ID: ObjectId = ObjectId(2);

/// Something the connection wants the application to know about.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A frame was dropped (unknown target or opcode). The connection
    /// carries on.
    Warning(Arc<WaylinkError>),
    /// An error nobody handled: a decode failure on an object without
    /// error listeners, a fatal protocol error, or the stream failing.
    Error(Arc<WaylinkError>),
}

/// A global advertised by the registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Global {
    /// Numeric name used to bind it.
    pub name: u32,
    pub interface: String,
    /// Highest version the server supports.
    pub version: u32,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by the `Display`, the frame pump, and (weakly) every proxy.
pub(crate) struct Shared {
    pub(crate) conn: StreamConnection,
    registry: Mutex<ObjectRegistry>,
    schema: RwLock<Schema>,
    globals: Mutex<Vec<Global>>,
    notices: broadcast::Sender<Notice>,
    /// No more requests go out.
    closed: AtomicBool,
    /// The pump stops after the frame it is dispatching.
    failed: AtomicBool,
    /// Flips to `true` once the pump has stopped for good.
    torn_down: watch::Sender<bool>,
}

impl Shared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Releases every pending wait, including those held on objects that
    /// were already deleted.
    pub(crate) fn signal_torn_down(&self) {
        self.torn_down.send_replace(true);
    }

    /// Resolves once the connection has been torn down.
    pub(crate) fn torn_down_signal(&self) -> ClosedSignal {
        let mut rx = self.torn_down.subscribe();
        ClosedSignal::new(async move {
            // A dropped sender means the state is gone too.
            let _ = rx.wait_for(|done| *done).await;
        })
    }

    fn interface(&self, name: &str) -> Result<Arc<Interface>, WaylinkError> {
        let schema = self.schema.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(schema.get(name)?)
    }

    /// Builds a proxy for `interface` at `id` and registers it.
    pub(crate) fn register(
        self: &Arc<Self>,
        id: ObjectId,
        interface: &str,
        version: Option<u32>,
    ) -> Result<Proxy, WaylinkError> {
        let interface = self.interface(interface)?;
        let version = version.unwrap_or_else(|| interface.version());
        let proxy = Proxy::new(id, interface, version, Arc::downgrade(self));
        lock(&self.registry).insert(proxy.clone());
        tracing::debug!(object = id.get(), interface = proxy.interface(), "object registered");
        Ok(proxy)
    }

    /// Allocates an identity and registers a proxy for `interface` there.
    pub(crate) fn create(
        self: &Arc<Self>,
        interface: &str,
        version: Option<u32>,
    ) -> Result<Proxy, WaylinkError> {
        let interface = self.interface(interface)?;
        let version = version.unwrap_or_else(|| interface.version());
        let mut registry = lock(&self.registry);
        let id = registry.allocate_id()?;
        let proxy = Proxy::new(id, interface, version, Arc::downgrade(self));
        registry.insert(proxy.clone());
        drop(registry);
        tracing::debug!(object = id.get(), interface = proxy.interface(), "object created");
        Ok(proxy)
    }

    pub(crate) fn delete_id(&self, id: ObjectId) -> Option<Proxy> {
        let removed = lock(&self.registry).remove(id);
        if removed.is_some() {
            tracing::debug!(object = id.get(), "object deleted");
        }
        removed
    }

    pub(crate) fn lookup(&self, id: ObjectId) -> Option<Proxy> {
        lock(&self.registry).get(id)
    }

    pub(crate) fn objects(&self) -> Vec<Proxy> {
        lock(&self.registry).objects()
    }

    /// Encodes and writes one request.
    ///
    /// Everything that can go wrong with the arguments is checked before
    /// the first byte is written.
    pub(crate) async fn request(
        &self,
        id: ObjectId,
        opcode: u16,
        def: &MessageDefinition,
        args: &[Arg],
    ) -> Result<(), WaylinkError> {
        if def.has_fd() {
            let interface = self.lookup(id).map(|p| p.interface().to_owned());
            return Err(WaylinkError::FdUnsupported {
                interface: interface.unwrap_or_else(|| id.to_string()),
                request: def.name.clone(),
            });
        }
        let payload = format_args(args, &def.args)?;
        let frame = encode_frame(ByteOrder::NATIVE, id, opcode, &payload)?;
        if self.is_closed() {
            return Err(WaylinkError::ConnectionClosed);
        }
        tracing::trace!(object = id.get(), opcode, request = %def.name, len = frame.len(), "request");
        self.conn.send(&frame).await?;
        Ok(())
    }

    /// Round-trips through the display's `sync` barrier.
    pub(crate) async fn sync(&self) -> Result<(), WaylinkError> {
        let display = self
            .lookup(ObjectId::DISPLAY)
            .ok_or(WaylinkError::UnknownTarget(ObjectId::DISPLAY))?;
        display.request("sync", &[]).await
    }

    /// Reports a dropped frame.
    pub(crate) fn warn(&self, warning: WaylinkError) {
        let _ = self.notices.send(Notice::Warning(Arc::new(warning)));
    }

    /// Escalates an error to the connection. Logged if nobody is
    /// listening, so it can't vanish silently.
    pub(crate) fn escalate(&self, error: WaylinkError) {
        let error = Arc::new(error);
        if self.notices.send(Notice::Error(Arc::clone(&error))).is_err() {
            tracing::error!(conn_id = %self.conn.id(), error = %error, "unhandled connection error");
        }
    }

    fn record_global(&self, global: Global) {
        tracing::debug!(name = global.name, interface = %global.interface, version = global.version, "global advertised");
        lock(&self.globals).push(global);
    }

    /// Turns a `wl_display.error` event into a `Fatal` error and marks the
    /// connection failed. The frame pump tears the stream down once the
    /// current frame has been dispatched.
    fn fatal(&self, event: &Event) {
        let object = ObjectId(event.u32(0).unwrap_or(0));
        let code = event.u32(1).unwrap_or(0);
        let message = event.str(2).unwrap_or_default().to_owned();

        let source = self.lookup(object);
        let entry = source.as_ref().and_then(|p| {
            p.definition()
                .enum_entries("error")
                .and_then(|entries| entries.iter().find(|e| e.value == code))
                .cloned()
        });
        let error = WaylinkError::Fatal {
            object,
            interface: source.as_ref().map(|p| p.interface().to_owned()),
            code,
            code_name: entry.as_ref().map(|e| e.name.clone()),
            summary: entry.and_then(|e| e.summary),
            message,
        };
        tracing::error!(error = %error, "fatal protocol error");
        self.mark_closed();
        self.failed.store(true, Ordering::Release);
        self.escalate(error);
    }

    /// Closes the stream after the frame pump has stopped.
    pub(crate) async fn teardown(&self) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!(conn_id = %self.conn.id(), error = %e, "close after teardown failed");
        }
        tracing::debug!(conn_id = %self.conn.id(), "connection torn down");
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and opening a [`Display`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), waylink::WaylinkError> {
/// use waylink::{DisplayBuilder, DisplayConfig};
///
/// let display = DisplayBuilder::new()
///     .socket_path("/run/user/1000/wayland-1")
///     .config(DisplayConfig::default())
///     .connect()
///     .await?;
/// for global in display.globals() {
///     println!("{} v{}", global.interface, global.version);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DisplayBuilder {
    socket_path: Option<PathBuf>,
    schema: Option<Schema>,
    config: DisplayConfig,
}

impl DisplayBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            socket_path: None,
            schema: None,
            config: DisplayConfig::default(),
        }
    }

    /// Connects to this socket instead of the one named by the
    /// environment.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Uses this schema instead of the bundled core protocol.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(mut self, config: DisplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens the socket, starts the frame pump, and runs the bootstrap.
    #[cfg(unix)]
    pub async fn connect(self) -> Result<Display, WaylinkError> {
        let transport = match &self.socket_path {
            Some(path) => UnixTransport::new(path.clone()),
            None => UnixTransport::from_env()?,
        };
        let conn = transport.connect().await?;
        let display = self.build(conn)?;
        display.init().await?;
        Ok(display)
    }

    /// Wraps an already open connection and starts the frame pump.
    ///
    /// Doesn't talk to the server yet; call [`Display::init`] for that.
    /// Must be called from within a Tokio runtime.
    pub fn build(self, conn: StreamConnection) -> Result<Display, WaylinkError> {
        let mut schema = match self.schema {
            Some(schema) => schema,
            None => Schema::wayland()?,
        };
        if schema.callback_interface() != self.config.callback_interface {
            schema.set_callback_interface(self.config.callback_interface.clone());
        }
        let (notices, _) = broadcast::channel(self.config.notice_capacity.max(1));

        let shared = Arc::new(Shared {
            conn,
            registry: Mutex::new(ObjectRegistry::new(self.config.max_client_id)),
            schema: RwLock::new(schema),
            globals: Mutex::new(Vec::new()),
            notices,
            closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            torn_down: watch::Sender::new(false),
        });
        tracing::debug!(conn_id = %shared.conn.id(), "display created");
        let pump = tokio::spawn(pump::run(Arc::clone(&shared)));

        Ok(Display {
            shared,
            pump,
            config: self.config,
        })
    }
}

impl Default for DisplayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// One client connection.
///
/// Dropping the `Display` stops the frame pump; proxies that outlive it
/// fail every call with [`WaylinkError::ConnectionClosed`].
pub struct Display {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
    config: DisplayConfig,
}

impl Display {
    /// Creates a new builder.
    pub fn builder() -> DisplayBuilder {
        DisplayBuilder::new()
    }

    /// Connects to the compositor named by the environment with the
    /// bundled schema, and bootstraps.
    #[cfg(unix)]
    pub async fn connect() -> Result<Self, WaylinkError> {
        DisplayBuilder::new().connect().await
    }

    /// Wraps an open connection with default settings. See
    /// [`DisplayBuilder::build`].
    pub fn from_connection(conn: StreamConnection) -> Result<Self, WaylinkError> {
        DisplayBuilder::new().build(conn)
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.conn.id()
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Bootstraps the connection and returns the registry.
    ///
    /// 1. Registers the display at identity 1, with handlers for its
    ///    `error` and `delete_id` events.
    /// 2. Sends `get_registry` (the registry gets identity 2) and records
    ///    every `global` it advertises.
    /// 3. Waits on a `sync` barrier, so all initial globals are known when
    ///    this returns.
    pub async fn init(&self) -> Result<Proxy, WaylinkError> {
        {
            let mut schema = self.shared.schema.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            schema.expand_bind_request("wl_registry")?;
        }

        let display = self.shared.register(ObjectId::DISPLAY, "wl_display", None)?;
        let weak = Arc::downgrade(&self.shared);
        display.on("error", move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.fatal(event);
            }
        });
        let weak = Arc::downgrade(&self.shared);
        display.on("delete_id", move |event| {
            let Some(shared) = weak.upgrade() else { return };
            match event.u32(0) {
                Some(id) if id != ObjectId::DISPLAY.get() => {
                    shared.delete_id(ObjectId(id));
                }
                _ => {}
            }
        });

        let registry = display.create("get_registry", &[]).await?;
        let weak = Arc::downgrade(&self.shared);
        registry.on("global", move |event| {
            let Some(shared) = weak.upgrade() else { return };
            let (Some(name), Some(interface), Some(version)) =
                (event.u32(0), event.str(1), event.u32(2))
            else {
                return;
            };
            shared.record_global(Global {
                name,
                interface: interface.to_owned(),
                version,
            });
        });
        registry.on("global_remove", |event| {
            tracing::debug!(name = ?event.u32(0), "global removed; not tracked");
        });

        self.sync().await?;
        tracing::info!(conn_id = %self.id(), globals = self.globals().len(), "display initialized");
        Ok(registry)
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Adds more interface definitions (protocol extensions).
    pub fn load(&self, schema: Schema) {
        let mut current = self.shared.schema.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        current.extend(schema);
    }

    /// Loads a JSON interface list from disk and adds it.
    pub fn load_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), WaylinkError> {
        let schema = Schema::load_file(path)?;
        self.load(schema);
        Ok(())
    }

    /// The loaded definition of `interface`.
    pub fn definition(&self, interface: &str) -> Result<Arc<Interface>, WaylinkError> {
        self.shared.interface(interface)
    }

    /// Resolves `"interface.enum"` to a name → value map.
    pub fn enum_values(&self, qualified: &str) -> Result<BTreeMap<String, u32>, WaylinkError> {
        let schema = self.shared.schema.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(schema.enum_values(qualified)?)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Low-level send: encodes `args` against `def` and writes one frame
    /// for object `id`.
    pub async fn request(
        &self,
        id: ObjectId,
        opcode: u16,
        def: &MessageDefinition,
        args: &[Arg],
    ) -> Result<(), WaylinkError> {
        self.shared.request(id, opcode, def, args).await
    }

    /// Waits until the server has processed every request sent so far and
    /// delivered the resulting events.
    pub async fn sync(&self) -> Result<(), WaylinkError> {
        self.shared.sync().await
    }

    /// Binds an advertised global.
    ///
    /// `version` defaults to the loaded definition's version; either way it
    /// is capped at what the server advertised. When the same interface
    /// was advertised more than once, the latest advertisement is used.
    pub async fn bind(&self, interface: &str, version: Option<u32>) -> Result<Proxy, WaylinkError> {
        let def = self.definition(interface)?;
        let global = self
            .globals()
            .into_iter()
            .rev()
            .find(|g| g.interface == interface)
            .ok_or_else(|| WaylinkError::NoGlobal {
                name: interface.to_owned(),
                available: self
                    .globals()
                    .iter()
                    .map(|g| g.interface.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        if let Some(requested) = version {
            if requested != def.version() {
                tracing::warn!(
                    interface,
                    requested,
                    defined = def.version(),
                    "version mismatch: binding at a version the loaded definition doesn't describe"
                );
            }
        }
        let version = version.unwrap_or(def.version()).min(global.version);

        let registry = self.registry_object()?;
        let bound = self.shared.create(interface, Some(version))?;
        let args = [
            Arg::Uint(global.name),
            Arg::from(def.name()),
            Arg::Uint(version),
            Arg::NewId(bound.id().get()),
        ];
        if let Err(source) = registry.request("bind", &args).await {
            self.shared.delete_id(bound.id());
            return Err(WaylinkError::Request {
                interface: registry.interface().to_owned(),
                request: "bind".to_owned(),
                args: "name, interface, version, id".to_owned(),
                source: Box::new(source),
            });
        }
        tracing::debug!(interface, version, object = bound.id().get(), "global bound");
        Ok(bound)
    }

    /// Every global advertised so far, in order.
    pub fn globals(&self) -> Vec<Global> {
        lock(&self.shared.globals).clone()
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Allocates an identity and registers a local object for `interface`.
    /// Nothing is sent.
    pub fn create(&self, interface: &str) -> Result<Proxy, WaylinkError> {
        self.shared.create(interface, None)
    }

    /// Registers an object at an identity chosen elsewhere (by the server,
    /// or by a request built by hand).
    pub fn register(&self, id: ObjectId, interface: &str) -> Result<Proxy, WaylinkError> {
        self.shared.register(id, interface, None)
    }

    /// Forgets an object. Frames for it are dropped with a warning from
    /// now on.
    pub fn delete_id(&self, id: ObjectId) -> Option<Proxy> {
        self.shared.delete_id(id)
    }

    pub fn lookup(&self, id: ObjectId) -> Option<Proxy> {
        self.shared.lookup(id)
    }

    /// Some live object implementing `interface`.
    pub fn find(&self, interface: &str) -> Option<Proxy> {
        lock(&self.shared.registry).find_by_interface(interface)
    }

    /// All live objects, ordered by identity.
    pub fn objects(&self) -> Vec<Proxy> {
        self.shared.objects()
    }

    /// The display object (identity 1). Available after [`init`](Self::init).
    pub fn display_object(&self) -> Result<Proxy, WaylinkError> {
        self.lookup(ObjectId::DISPLAY)
            .ok_or(WaylinkError::UnknownTarget(ObjectId::DISPLAY))
    }

    /// The registry created during bootstrap.
    pub fn registry_object(&self) -> Result<Proxy, WaylinkError> {
        self.lookup(REGISTRY_ID)
            .filter(|p| p.interface() == "wl_registry")
            .or_else(|| self.find("wl_registry"))
            .ok_or(WaylinkError::UnknownTarget(REGISTRY_ID))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Warnings and unhandled errors from now on.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Closes our half of the stream. Further requests fail with
    /// [`WaylinkError::ConnectionClosed`]. Events already in flight are
    /// still dispatched until the server hangs up, after which pending
    /// waits resolve with `ConnectionClosed`.
    pub async fn close(&self) -> Result<(), WaylinkError> {
        self.shared.mark_closed();
        self.shared.conn.close().await?;
        Ok(())
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.id())
            .field("objects", &lock(&self.shared.registry).len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
