//! In-memory model document and the provider that hands out the active one.
//!
//! The document is read-only from the checker's perspective; a run holds an
//! `Arc<Document>` snapshot for its whole lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Result;

/// A network of timed-automata templates plus the stored check specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Display name of the model.
    pub name: String,

    /// Global declarations, kept verbatim.
    #[serde(default)]
    pub declaration: String,

    /// Check specification text persisted alongside the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,

    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Document {
    /// Create an empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: String::new(),
            specification: None,
            templates: Vec::new(),
        }
    }

    /// Parse a document from its JSON serialization.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    /// Return a copy of this document with `text` stored as its check specification.
    pub fn with_specification(mut self, text: impl Into<String>) -> Self {
        self.specification = Some(text.into());
        self
    }

    pub fn stored_specification(&self) -> Option<&str> {
        self.specification.as_deref()
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }
}

/// A single automaton.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub name: String,

    /// Name of the initial location.
    pub init: String,

    pub locations: Vec<String>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Template {
    /// Create a template whose only location is `init`.
    pub fn new(name: impl Into<String>, init: impl Into<String>) -> Self {
        let init = init.into();
        Self {
            name: name.into(),
            locations: vec![init.clone()],
            init,
            edges: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.locations.push(location.into());
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Edges leaving `location`, in declaration order.
    pub fn outgoing<'a>(&'a self, location: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == location)
    }
}

/// A transition between two locations of a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<Synchronisation>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            sync: None,
        }
    }

    pub fn sending(mut self, channel: impl Into<String>) -> Self {
        self.sync = Some(Synchronisation {
            channel: channel.into(),
            kind: SyncKind::Send,
        });
        self
    }

    pub fn receiving(mut self, channel: impl Into<String>) -> Self {
        self.sync = Some(Synchronisation {
            channel: channel.into(),
            kind: SyncKind::Receive,
        });
        self
    }

    /// Whether this edge synchronises on `channel` with the given direction.
    pub fn syncs_on(&self, channel: &str, kind: SyncKind) -> bool {
        self.sync
            .as_ref()
            .is_some_and(|s| s.channel == channel && s.kind == kind)
    }
}

/// Direction of a channel synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncKind {
    Send,
    Receive,
}

/// A channel synchronisation label, serialized as `chan!` or `chan?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Synchronisation {
    pub channel: String,
    pub kind: SyncKind,
}

impl TryFrom<String> for Synchronisation {
    type Error = String;

    fn try_from(label: String) -> std::result::Result<Self, Self::Error> {
        let label = label.trim();
        let (channel, kind) = if let Some(channel) = label.strip_suffix('!') {
            (channel, SyncKind::Send)
        } else if let Some(channel) = label.strip_suffix('?') {
            (channel, SyncKind::Receive)
        } else {
            return Err(format!("synchronisation '{label}' must end in '!' or '?'"));
        };

        let channel = channel.trim();
        if channel.is_empty() {
            return Err(format!("synchronisation '{label}' has no channel name"));
        }

        Ok(Self {
            channel: channel.to_string(),
            kind,
        })
    }
}

impl From<Synchronisation> for String {
    fn from(sync: Synchronisation) -> Self {
        sync.to_string()
    }
}

impl fmt::Display for Synchronisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SyncKind::Send => write!(f, "{}!", self.channel),
            SyncKind::Receive => write!(f, "{}?", self.channel),
        }
    }
}

/// Source of the currently active document.
pub trait DocumentProvider: Send + Sync {
    /// Read-only snapshot of the active document.
    fn current(&self) -> Arc<Document>;
}

/// Document provider backed by a watch channel, so consumers can be told
/// once per change instead of polling.
#[derive(Debug)]
pub struct MemoryDocumentProvider {
    current: watch::Sender<Arc<Document>>,
}

impl MemoryDocumentProvider {
    pub fn new(document: Document) -> Self {
        let (current, _) = watch::channel(Arc::new(document));
        Self { current }
    }

    /// Replace the active document, notifying every change subscriber.
    pub fn set(&self, document: Document) {
        self.current.send_replace(Arc::new(document));
    }

    /// Subscribe to active-document changes.
    pub fn changes(&self) -> watch::Receiver<Arc<Document>> {
        self.current.subscribe()
    }
}

impl DocumentProvider for MemoryDocumentProvider {
    fn current(&self) -> Arc<Document> {
        Arc::clone(&self.current.borrow())
    }
}
