//! Snapshots: everything an object emitted during a window, as one value.
//!
//! The protocol pushes state as a burst of events (an output sends
//! `geometry`, one `mode` per mode, `scale`, `name`, `done`). An
//! [`Aggregation`] listens to every event an object declares and files
//! each receipt under the event's name:
//!
//! | event arguments              | stored as                   |
//! |------------------------------|-----------------------------|
//! | none                         | `true`                      |
//! | one                          | the bare value              |
//! | several                      | the list of values          |
//! | a newly announced object     | that object's own snapshot  |
//!
//! When finished, a name received exactly once holds that entry directly;
//! a name received several times holds the list.
//!
//! ```text
//! { "id": 7, "name": "eDP-1", "scale": 2,
//!   "mode": [[3, 2560, 1600, 60000], [0, 1920, 1200, 60000]], "done": true }
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use waylink_protocol::{Arg, ObjectId};

use crate::events::{Event, EventArg, ListenerGuard};
use crate::{lock, Proxy};

/// One receipt of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// The event carried no arguments.
    Flag,
    Value(Arg),
    Args(Vec<Arg>),
    /// The event announced a new object; this is what it emitted until the
    /// window closed.
    Object(Snapshot),
}

/// Everything received under one event name.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    One(Entry),
    Many(Vec<Entry>),
}

impl Field {
    /// The entry if the event arrived exactly once.
    pub fn one(&self) -> Option<&Entry> {
        match self {
            Self::One(e) => Some(e),
            Self::Many(_) => None,
        }
    }

    /// All entries, whichever way they're stored.
    pub fn entries(&self) -> &[Entry] {
        match self {
            Self::One(e) => std::slice::from_ref(e),
            Self::Many(all) => all,
        }
    }
}

/// The finished result of an [`Aggregation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: ObjectId,
    pub interface: String,
    pub fields: BTreeMap<String, Field>,
}

impl Snapshot {
    pub fn get(&self, event: &str) -> Option<&Field> {
        self.fields.get(event)
    }

    /// The single value of an event received once with one argument.
    pub fn value(&self, event: &str) -> Option<&Arg> {
        match self.get(event)?.one()? {
            Entry::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Flag => serializer.serialize_bool(true),
            Self::Value(v) => v.serialize(serializer),
            Self::Args(all) => all.serialize(serializer),
            Self::Object(snapshot) => snapshot.serialize(serializer),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::One(e) => e.serialize(serializer),
            Self::Many(all) => all.serialize(serializer),
        }
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (name, field) in &self.fields {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// A receipt not yet finalized: nested objects are still recording.
enum Pending {
    Done(Entry),
    Nested(Aggregation),
}

/// Records one object's events until [`finish`](Self::finish) is called.
///
/// Dropping it without finishing just detaches the listeners.
pub struct Aggregation {
    id: ObjectId,
    interface: String,
    buckets: Arc<Mutex<BTreeMap<String, Vec<Pending>>>>,
    guards: Vec<ListenerGuard>,
}

impl Aggregation {
    pub(crate) fn attach(proxy: &Proxy) -> Self {
        let buckets: Arc<Mutex<BTreeMap<String, Vec<Pending>>>> = Arc::default();
        let guards = proxy
            .definition()
            .events()
            .iter()
            .map(|event| {
                let buckets = Arc::clone(&buckets);
                let id = proxy.on(&event.name, move |e: &Event| {
                    let pending = receipt(e);
                    lock(&buckets)
                        .entry(e.name.clone())
                        .or_default()
                        .push(pending);
                });
                ListenerGuard::new(proxy.clone(), id)
            })
            .collect();

        Self {
            id: proxy.id(),
            interface: proxy.interface().to_owned(),
            buckets,
            guards,
        }
    }

    /// Detaches every listener (nested ones included) and collapses the
    /// recorded receipts into a [`Snapshot`].
    pub fn finish(self) -> Snapshot {
        let Self {
            id,
            interface,
            buckets,
            guards,
        } = self;
        drop(guards);

        let recorded = std::mem::take(&mut *lock(&buckets));
        let fields = recorded
            .into_iter()
            .map(|(name, receipts)| {
                let mut entries: Vec<Entry> = receipts
                    .into_iter()
                    .map(|p| match p {
                        Pending::Done(entry) => entry,
                        Pending::Nested(nested) => Entry::Object(nested.finish()),
                    })
                    .collect();
                let field = if entries.len() == 1 {
                    Field::One(entries.remove(0))
                } else {
                    Field::Many(entries)
                };
                (name, field)
            })
            .collect();

        Snapshot {
            id,
            interface,
            fields,
        }
    }
}

/// Turns one event into a receipt. A leading new object starts its own
/// nested recording right away, so its first events aren't missed.
fn receipt(event: &Event) -> Pending {
    if let Some(EventArg::Object(created)) = event.args.first() {
        return Pending::Nested(created.aggregate());
    }
    let mut values: Vec<Arg> = event
        .args
        .iter()
        .filter_map(|a| a.as_value().cloned())
        .collect();
    let entry = match values.len() {
        0 => Entry::Flag,
        1 => Entry::Value(values.remove(0)),
        _ => Entry::Args(values),
    };
    Pending::Done(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes_flags_values_and_lists() {
        let mut fields = BTreeMap::new();
        fields.insert("done".to_owned(), Field::One(Entry::Flag));
        fields.insert("scale".to_owned(), Field::One(Entry::Value(Arg::Int(2))));
        fields.insert(
            "mode".to_owned(),
            Field::Many(vec![
                Entry::Args(vec![Arg::Uint(3), Arg::Int(1920)]),
                Entry::Args(vec![Arg::Uint(0), Arg::Int(1280)]),
            ]),
        );
        let snapshot = Snapshot {
            id: ObjectId(7),
            interface: "wl_output".into(),
            fields,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "done": true,
                "mode": [[3, 1920], [0, 1280]],
                "scale": 2,
            })
        );
    }

    #[test]
    fn test_field_entries_covers_both_shapes() {
        let one = Field::One(Entry::Flag);
        assert_eq!(one.entries().len(), 1);
        assert!(one.one().is_some());

        let many = Field::Many(vec![Entry::Flag, Entry::Flag]);
        assert_eq!(many.entries().len(), 2);
        assert!(many.one().is_none());
    }

    #[test]
    fn test_snapshot_value_reads_single_receipt() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), Field::One(Entry::Value(Arg::from("eDP-1"))));
        let snapshot = Snapshot {
            id: ObjectId(7),
            interface: "wl_output".into(),
            fields,
        };
        assert_eq!(snapshot.value("name"), Some(&Arg::from("eDP-1")));
        assert_eq!(snapshot.value("scale"), None);
    }
}
