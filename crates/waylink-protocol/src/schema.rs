//! Schema model: what requests, events, and enums an interface declares.
//!
//! Definitions are plain data, loaded once (usually from a pre-parsed JSON
//! protocol file) and shared read-only by every object of that interface.
//! Nothing here knows what a "surface" or an "output" is; the engine only
//! ever looks at argument types.
//!
//! On top of the raw [`InterfaceDefinition`], [`Interface`] keeps a request
//! table built once at load time: request name → opcode and
//! [`RequestKind`]. Objects dispatch calls through that table instead of
//! re-scanning the definition on every request.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Interface used for one-shot barrier objects unless configured otherwise.
pub const DEFAULT_CALLBACK_INTERFACE: &str = "wl_callback";

// ---------------------------------------------------------------------------
// ArgType
// ---------------------------------------------------------------------------

/// The type tag of one argument.
///
/// Unknown tags are kept as [`ArgType::Other`] instead of failing the whole
/// schema load: the codec rejects them when (and only when) a message that
/// uses them is actually encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArgType {
    NewId,
    Uint,
    Int,
    Fixed,
    Object,
    Enum,
    String,
    Array,
    Fd,
    Other(std::string::String),
}

impl ArgType {
    /// The tag as it appears in protocol files.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewId => "new_id",
            Self::Uint => "uint",
            Self::Int => "int",
            Self::Fixed => "fixed",
            Self::Object => "object",
            Self::Enum => "enum",
            Self::String => "string",
            Self::Array => "array",
            Self::Fd => "fd",
            Self::Other(name) => name,
        }
    }
}

impl From<std::string::String> for ArgType {
    fn from(tag: std::string::String) -> Self {
        match tag.as_str() {
            "new_id" => Self::NewId,
            "uint" => Self::Uint,
            "int" => Self::Int,
            "fixed" => Self::Fixed,
            "object" => Self::Object,
            "enum" => Self::Enum,
            "string" => Self::String,
            "array" => Self::Array,
            "fd" => Self::Fd,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for ArgType {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_owned())
    }
}

impl From<ArgType> for std::string::String {
    fn from(ty: ArgType) -> Self {
        ty.as_str().to_owned()
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// One argument of a request or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: ArgType,

    /// For `new_id` (and typed `object`) arguments: the interface of the
    /// object being referred to or created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// Qualified enum this value belongs to (`wl_output.transform`).
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,

    /// Whether a null object (identity 0) or null string is allowed.
    #[serde(
        rename = "allow-null",
        default,
        deserialize_with = "lenient::flag",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub allow_null: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ArgumentDefinition {
    /// Shorthand for a definition with just a name and a type.
    pub fn new(name: impl Into<String>, ty: impl Into<ArgType>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            interface: None,
            enum_name: None,
            allow_null: false,
            summary: None,
        }
    }

    /// A `new_id` argument creating an object of `interface`.
    pub fn new_id(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            interface: Some(interface.into()),
            ..Self::new(name, ArgType::NewId)
        }
    }

    /// Returns the created interface if this is a `new_id` argument.
    pub fn created_interface(&self) -> Option<&str> {
        match self.ty {
            ArgType::NewId => self.interface.as_deref(),
            _ => None,
        }
    }
}

/// A request or an event. Both have the same shape: a name and an ordered
/// argument list. The position in the interface's list is the opcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub name: String,

    /// `"destructor"` for requests that destroy the object.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Interface version that introduced this message.
    #[serde(
        default,
        deserialize_with = "lenient::optional_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub since: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub args: Vec<ArgumentDefinition>,
}

impl MessageDefinition {
    /// A message with the given name and arguments.
    pub fn new(name: impl Into<String>, args: Vec<ArgumentDefinition>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            since: None,
            summary: None,
            description: None,
            args,
        }
    }

    /// Returns `true` for destructor requests.
    pub fn is_destructor(&self) -> bool {
        self.kind.as_deref() == Some("destructor")
    }

    /// Returns `true` if any argument is a file descriptor.
    pub fn has_fd(&self) -> bool {
        self.args.iter().any(|a| a.ty == ArgType::Fd)
    }
}

/// One named value of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Immutable schema for one interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(deserialize_with = "lenient::u32")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub requests: Vec<MessageDefinition>,
    #[serde(default)]
    pub events: Vec<MessageDefinition>,
    #[serde(default)]
    pub enums: BTreeMap<String, Vec<EnumEntry>>,
}

impl InterfaceDefinition {
    /// An empty interface definition; fill in requests and events directly.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            summary: None,
            description: None,
            requests: Vec::new(),
            events: Vec::new(),
            enums: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request table
// ---------------------------------------------------------------------------

/// How a request is issued, decided by its first argument.
///
/// Checked in order, first match wins:
/// 1. `new_id` of the callback interface → barrier: wait for the
///    callback's single event, then retire it.
/// 2. `new_id` of any other interface → the call returns the new object.
/// 3. anything else → encode and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Callback { interface: String },
    Create { interface: String },
    Plain,
}

impl RequestKind {
    /// Classifies a request definition.
    pub fn classify(request: &MessageDefinition, callback_interface: &str) -> Self {
        match request.args.first().and_then(|a| a.created_interface()) {
            Some(name) if name == callback_interface => Self::Callback {
                interface: name.to_owned(),
            },
            Some(name) => Self::Create {
                interface: name.to_owned(),
            },
            None => Self::Plain,
        }
    }
}

/// Entry of the per-interface request table.
#[derive(Debug, Clone)]
pub struct RequestEntry {
    pub opcode: u16,
    pub kind: RequestKind,
}

/// A loaded interface: its definition plus the request table.
#[derive(Debug, Clone)]
pub struct Interface {
    definition: InterfaceDefinition,
    table: HashMap<String, RequestEntry>,
}

impl Interface {
    /// Builds the request table for `definition`.
    ///
    /// Opcodes are 16 bits wide on the wire; requests past index 65535
    /// can't be addressed and are left out of the table.
    pub fn new(definition: InterfaceDefinition, callback_interface: &str) -> Self {
        let table = definition
            .requests
            .iter()
            .enumerate()
            .filter_map(|(index, request)| {
                let opcode = u16::try_from(index).ok()?;
                let kind = RequestKind::classify(request, callback_interface);
                Some((request.name.clone(), RequestEntry { opcode, kind }))
            })
            .collect();
        Self { definition, table }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn version(&self) -> u32 {
        self.definition.version
    }

    pub fn definition(&self) -> &InterfaceDefinition {
        &self.definition
    }

    pub fn requests(&self) -> &[MessageDefinition] {
        &self.definition.requests
    }

    pub fn events(&self) -> &[MessageDefinition] {
        &self.definition.events
    }

    /// Looks up a request by name.
    pub fn request(&self, name: &str) -> Option<(&RequestEntry, &MessageDefinition)> {
        let entry = self.table.get(name)?;
        let def = self.definition.requests.get(usize::from(entry.opcode))?;
        Some((entry, def))
    }

    /// Returns the opcode of the named request.
    pub fn opcode(&self, name: &str) -> Option<u16> {
        self.table.get(name).map(|e| e.opcode)
    }

    /// Looks up an event by opcode.
    pub fn event(&self, opcode: u16) -> Option<&MessageDefinition> {
        self.definition.events.get(usize::from(opcode))
    }

    /// Entries of one of this interface's enums.
    pub fn enum_entries(&self, name: &str) -> Option<&[EnumEntry]> {
        self.definition.enums.get(name).map(Vec::as_slice)
    }

    /// Multi-line dump: the interface with its events, then one line per
    /// request with its typed arguments.
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        for request in &self.definition.requests {
            let args: Vec<String> = request
                .args
                .iter()
                .map(|a| format!("{} :{}", a.name, a.ty))
                .collect();
            out.push_str(&format!("\n  {}({})", request.name, args.join(", ")));
        }
        out
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<&str> = self.events().iter().map(|e| e.name.as_str()).collect();
        write!(f, "{}({})", self.name(), events.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// The set of loaded interfaces, keyed by name.
#[derive(Debug, Clone)]
pub struct Schema {
    interfaces: HashMap<String, Arc<Interface>>,
    callback_interface: String,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self {
            interfaces: HashMap::new(),
            callback_interface: DEFAULT_CALLBACK_INTERFACE.to_owned(),
        }
    }

    /// Builds a schema from a list of definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = InterfaceDefinition>,
    ) -> Self {
        let mut schema = Self::new();
        for def in definitions {
            schema.insert(def);
        }
        schema
    }

    /// Parses a pre-parsed JSON interface list.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let definitions: Vec<InterfaceDefinition> = serde_json::from_str(json)?;
        Ok(Self::from_definitions(definitions))
    }

    /// Loads a JSON interface list from disk.
    ///
    /// XML protocol files have to be converted first; that's the job of
    /// whatever produced the JSON, not of this crate.
    #[cfg(feature = "json")]
    pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if is_xml {
            return Err(ProtocolError::Schema(format!(
                "{} is XML; convert it to a JSON interface list first",
                path.display()
            )));
        }
        let json = std::fs::read_to_string(path)?;
        let schema = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), interfaces = schema.len(), "schema loaded");
        Ok(schema)
    }

    /// The bundled core protocol: display, registry, callback, compositor,
    /// region, shm, shm_pool, buffer, surface, seat, and output.
    #[cfg(feature = "json")]
    pub fn wayland() -> Result<Self, ProtocolError> {
        Self::from_json(include_str!("../protocol/wayland.json"))
    }

    /// Adds (or replaces) one interface.
    pub fn insert(&mut self, definition: InterfaceDefinition) {
        let interface = Interface::new(definition, &self.callback_interface);
        self.interfaces
            .insert(interface.name().to_owned(), Arc::new(interface));
    }

    /// Merges every interface of `other` into this schema.
    pub fn extend(&mut self, other: Schema) {
        for (_, interface) in other.interfaces {
            let definition = Arc::unwrap_or_clone(interface).definition;
            self.insert(definition);
        }
    }

    /// The interface whose `new_id` arguments are treated as barriers.
    pub fn callback_interface(&self) -> &str {
        &self.callback_interface
    }

    /// Changes the callback interface and rebuilds every request table.
    pub fn set_callback_interface(&mut self, name: impl Into<String>) {
        self.callback_interface = name.into();
        let definitions: Vec<InterfaceDefinition> = self
            .interfaces
            .drain()
            .map(|(_, i)| Arc::unwrap_or_clone(i).definition)
            .collect();
        for def in definitions {
            self.insert(def);
        }
    }

    /// Looks up an interface by name.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownInterface`] if nothing was loaded under it.
    pub fn get(&self, name: &str) -> Result<Arc<Interface>, ProtocolError> {
        self.interfaces
            .get(name)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownInterface(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Names of all loaded interfaces, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.interfaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves a qualified enum (`"wl_output.transform"`) to a
    /// name → value map.
    pub fn enum_values(&self, qualified: &str) -> Result<BTreeMap<String, u32>, ProtocolError> {
        let (interface, name) = qualified.split_once('.').ok_or_else(|| {
            ProtocolError::Schema(format!("enum name {qualified} is not interface.enum"))
        })?;
        let interface = self.get(interface)?;
        let entries = interface.enum_entries(name).ok_or_else(|| {
            ProtocolError::Schema(format!("no enum {name} in interface {}", interface.name()))
        })?;
        Ok(entries.iter().map(|e| (e.name.clone(), e.value)).collect())
    }

    /// Rewrites the first request of `interface` (the registry's `bind`)
    /// into the four values actually sent on the wire.
    ///
    /// The protocol file declares `bind` with a single untyped `new_id`.
    /// Because its interface isn't fixed, the wire form spells the type out:
    /// numeric global name, interface name, version, new identity.
    pub fn expand_bind_request(&mut self, interface: &str) -> Result<(), ProtocolError> {
        let mut definition = self.get(interface)?.definition().clone();
        let bind = definition.requests.first_mut().ok_or_else(|| {
            ProtocolError::Schema(format!("{interface} declares no requests"))
        })?;
        if bind.args.len() == 4 {
            return Ok(());
        }
        bind.args = vec![
            ArgumentDefinition::new("name", ArgType::Uint),
            ArgumentDefinition::new("interface", ArgType::String),
            ArgumentDefinition::new("version", ArgType::Uint),
            ArgumentDefinition::new("id", ArgType::NewId),
        ];
        self.insert(definition);
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Lenient deserializers
// ---------------------------------------------------------------------------

/// Protocol files converted straight from XML attributes carry numbers and
/// flags as strings (`"version": "4"`, `"allow-null": "true"`). These accept
/// both forms.
mod lenient {
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    fn parse_u32(s: &str) -> Option<u32> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        }
    }

    pub(super) fn u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        match NumberOrString::deserialize(d)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => {
                parse_u32(&s).ok_or_else(|| D::Error::custom(format!("invalid number {s:?}")))
            }
        }
    }

    pub(super) fn optional_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        u32(d).map(Some)
    }

    pub(super) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match BoolOrString::deserialize(d)? {
            BoolOrString::Bool(b) => Ok(b),
            BoolOrString::String(s) => Ok(s == "true"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback_request() -> MessageDefinition {
        MessageDefinition::new(
            "sync",
            vec![ArgumentDefinition::new_id("callback", "wl_callback")],
        )
    }

    #[test]
    fn test_arg_type_unknown_tag_is_kept() {
        let ty = ArgType::from("foo");
        assert_eq!(ty, ArgType::Other("foo".into()));
        assert_eq!(ty.to_string(), "foo");
    }

    #[test]
    fn test_classify_callback_first() {
        assert_eq!(
            RequestKind::classify(&callback_request(), DEFAULT_CALLBACK_INTERFACE),
            RequestKind::Callback {
                interface: "wl_callback".into()
            }
        );
    }

    #[test]
    fn test_classify_other_new_id_is_create() {
        let req = MessageDefinition::new(
            "get_registry",
            vec![ArgumentDefinition::new_id("registry", "wl_registry")],
        );
        assert_eq!(
            RequestKind::classify(&req, DEFAULT_CALLBACK_INTERFACE),
            RequestKind::Create {
                interface: "wl_registry".into()
            }
        );
    }

    #[test]
    fn test_classify_new_id_not_first_is_plain() {
        let req = MessageDefinition::new(
            "odd",
            vec![
                ArgumentDefinition::new("x", ArgType::Int),
                ArgumentDefinition::new_id("cb", "wl_callback"),
            ],
        );
        assert_eq!(
            RequestKind::classify(&req, DEFAULT_CALLBACK_INTERFACE),
            RequestKind::Plain
        );
    }

    #[test]
    fn test_interface_request_table_has_opcodes() {
        let mut def = InterfaceDefinition::new("wl_itf", 1);
        def.requests.push(MessageDefinition::new("destroy", vec![]));
        def.requests.push(callback_request());
        let itf = Interface::new(def, DEFAULT_CALLBACK_INTERFACE);

        assert_eq!(itf.opcode("destroy"), Some(0));
        assert_eq!(itf.opcode("sync"), Some(1));
        assert_eq!(itf.opcode("missing"), None);
        let (entry, req) = itf.request("sync").unwrap();
        assert_eq!(req.name, "sync");
        assert!(matches!(entry.kind, RequestKind::Callback { .. }));
    }

    #[test]
    fn test_interface_describe_lists_requests() {
        let mut def = InterfaceDefinition::new("wl_itf", 1);
        def.events.push(MessageDefinition::new("done", vec![]));
        def.requests.push(MessageDefinition::new(
            "set",
            vec![ArgumentDefinition::new("value", ArgType::Int)],
        ));
        let itf = Interface::new(def, DEFAULT_CALLBACK_INTERFACE);

        assert_eq!(itf.to_string(), "wl_itf(done)");
        assert_eq!(itf.describe(), "wl_itf(done)\n  set(value :int)");
    }

    #[test]
    fn test_schema_get_unknown_returns_error() {
        let schema = Schema::new();
        let err = schema.get("wl_nothing").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownInterface(ref n) if n == "wl_nothing"));
        assert_eq!(err.to_string(), "no interface definition for wl_nothing");
    }

    #[test]
    fn test_schema_from_json_accepts_string_attributes() {
        let json = r#"[{
            "name": "wl_output",
            "version": "3",
            "requests": [],
            "events": [{
                "name": "scale",
                "since": "2",
                "args": [{ "name": "factor", "type": "int" }]
            }],
            "enums": {
                "mode": [
                    { "name": "current", "value": "0x1" },
                    { "name": "preferred", "value": 2 }
                ]
            }
        }]"#;
        let schema = Schema::from_json(json).unwrap();
        let output = schema.get("wl_output").unwrap();

        assert_eq!(output.version(), 3);
        assert_eq!(output.event(0).unwrap().since, Some(2));
        let modes = schema.enum_values("wl_output.mode").unwrap();
        assert_eq!(modes["current"], 1);
        assert_eq!(modes["preferred"], 2);
    }

    #[test]
    fn test_schema_allow_null_parses_string_flag() {
        let json = r#"{ "name": "buffer", "type": "object", "allow-null": "true" }"#;
        let arg: ArgumentDefinition = serde_json::from_str(json).unwrap();
        assert!(arg.allow_null);
    }

    #[test]
    fn test_schema_enum_values_bad_name_returns_error() {
        let schema = Schema::wayland().unwrap();
        assert!(schema.enum_values("wl_output").is_err());
        assert!(schema.enum_values("wl_output.nope").is_err());
        assert!(schema.enum_values("wl_nothing.mode").is_err());
    }

    #[test]
    fn test_schema_wayland_bundle_has_core_interfaces() {
        let schema = Schema::wayland().unwrap();
        for name in ["wl_display", "wl_registry", "wl_callback", "wl_output"] {
            assert!(schema.contains(name), "missing {name}");
        }
        let callback = schema.get("wl_callback").unwrap();
        assert!(callback.requests().is_empty());
        assert_eq!(callback.events().len(), 1);

        let transforms = schema.enum_values("wl_output.transform").unwrap();
        assert_eq!(transforms["flipped"], 4);
    }

    #[test]
    fn test_expand_bind_request_rewrites_arguments_once() {
        let mut schema = Schema::wayland().unwrap();
        schema.expand_bind_request("wl_registry").unwrap();
        schema.expand_bind_request("wl_registry").unwrap();

        let registry = schema.get("wl_registry").unwrap();
        let (entry, bind) = registry.request("bind").unwrap();
        let types: Vec<&str> = bind.args.iter().map(|a| a.ty.as_str()).collect();
        assert_eq!(types, ["uint", "string", "uint", "new_id"]);
        // An untyped new_id is neither a barrier nor a typed creation.
        assert_eq!(entry.kind, RequestKind::Plain);
    }

    #[test]
    fn test_set_callback_interface_reclassifies() {
        let mut def = InterfaceDefinition::new("wl_itf", 1);
        def.requests.push(callback_request());
        let mut schema = Schema::from_definitions([def]);
        schema.set_callback_interface("my_callback");

        let itf = schema.get("wl_itf").unwrap();
        let (entry, _) = itf.request("sync").unwrap();
        assert!(matches!(entry.kind, RequestKind::Create { .. }));
    }

    #[test]
    fn test_load_file_rejects_xml() {
        let err = Schema::load_file("protocol/wayland.xml").unwrap_err();
        assert!(matches!(err, ProtocolError::Schema(_)));
    }
}
