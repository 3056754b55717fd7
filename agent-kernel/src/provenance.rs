//! Provenance classification for streamed agent output.
//!
//! The remote agent does not say outright whether a tool adapter produced
//! the answer, so detection is heuristic. A turn counts as tool-sourced
//! when any streamed event shows one of these signals, checked in order
//! and stopping at the first hit:
//!
//! 1. the trace record's type tag names a tool category;
//! 2. a nested `provider` field mentions the adapter family;
//! 3. a nested `metadata` or `detail` block contains an adapter keyword;
//! 4. the whole raw event contains an adapter keyword.
//!
//! Step 4 can fire on ordinary prose that happens to mention an adapter
//! keyword, which sends clean answers through the safety filter. Adapters
//! that emit no trace and no recognisable keyword go undetected and skip
//! the re-screen. Callers that know their tool names should add them with
//! [`ProvenanceDetector::with_keywords`].

use std::fmt;
use std::ops::ControlFlow;

use serde_json::Value;

/// Adapter family name looked for in `provider` fields.
pub const ADAPTER_FAMILY: &str = "mcp";

const TYPE_TAG_FIELDS: [&str; 3] = ["type", "eventType", "traceType"];
const TOOL_CATEGORIES: [&str; 6] = [
    "tool",
    "tool_use",
    "action_group",
    "action_group_invocation",
    "mcp",
    "plugin",
];
const KNOWLEDGE_BASE_CATEGORIES: [&str; 3] =
    ["knowledge_base", "knowledge_base_lookup", "retrieval"];
const MODEL_CATEGORIES: [&str; 3] = ["model", "model_invocation", "orchestration"];
const METADATA_FIELDS: [&str; 3] = ["metadata", "detail", "details"];
const DEFAULT_KEYWORDS: [&str; 6] = [
    "mcp",
    "plugin",
    "action_group",
    "actiongroup",
    "tool_use",
    "tooluse",
];

/// Lowercases a tag and strips `_` and `-` so `Tool-Use`, `TOOL_USE` and
/// `tooluse` compare equal.
fn normalize(tag: &str) -> String {
    tag.chars()
        .filter(|ch| *ch != '_' && *ch != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn in_category(tag: &str, categories: &[&str]) -> bool {
    let tag = normalize(tag);
    categories.iter().any(|category| normalize(category) == tag)
}

/// A node reached while walking a JSON value.
#[derive(Debug, Clone, Copy)]
enum Node<'a> {
    /// Object entry, visited before its value is walked.
    Field(&'a str, &'a Value),
    /// String leaf.
    Text(&'a str),
}

/// Depth-first walk over strings, mappings and sequences. Other leaves are
/// ignored.
fn walk<'a, B>(
    value: &'a Value,
    visit: &mut impl FnMut(Node<'a>) -> ControlFlow<B>,
) -> ControlFlow<B> {
    match value {
        Value::String(text) => visit(Node::Text(text)),
        Value::Object(map) => {
            for (key, nested) in map {
                visit(Node::Field(key, nested))?;
                walk(nested, visit)?;
            }
            ControlFlow::Continue(())
        }
        Value::Array(items) => {
            for item in items {
                walk(item, visit)?;
            }
            ControlFlow::Continue(())
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => ControlFlow::Continue(()),
    }
}

/// Trace record classified by its type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// The agent called a tool adapter.
    ToolInvocation {
        /// Type tag as sent by the agent.
        tag: String,
        /// Raw trace record.
        raw: Value,
    },
    /// The agent consulted a knowledge base.
    KnowledgeBaseLookup {
        /// Raw trace record.
        raw: Value,
    },
    /// The agent called its model.
    ModelInvocation {
        /// Raw trace record.
        raw: Value,
    },
    /// Anything else, including records without a type tag.
    Other {
        /// Raw trace record.
        raw: Value,
    },
}

impl TraceEvent {
    /// Classifies a raw trace record.
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        let Some(tag) = type_tag(&raw).map(str::to_owned) else {
            return Self::Other { raw };
        };

        if in_category(&tag, &TOOL_CATEGORIES) {
            Self::ToolInvocation { tag, raw }
        } else if in_category(&tag, &KNOWLEDGE_BASE_CATEGORIES) {
            Self::KnowledgeBaseLookup { raw }
        } else if in_category(&tag, &MODEL_CATEGORIES) {
            Self::ModelInvocation { raw }
        } else {
            Self::Other { raw }
        }
    }

    /// Raw trace record.
    #[must_use]
    pub fn raw(&self) -> &Value {
        match self {
            Self::ToolInvocation { raw, .. }
            | Self::KnowledgeBaseLookup { raw }
            | Self::ModelInvocation { raw }
            | Self::Other { raw } => raw,
        }
    }

    /// Returns `true` for tool invocations.
    #[must_use]
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, Self::ToolInvocation { .. })
    }

    /// Returns `true` for knowledge base lookups.
    #[must_use]
    pub fn is_knowledge_base_lookup(&self) -> bool {
        matches!(self, Self::KnowledgeBaseLookup { .. })
    }
}

fn type_tag(raw: &Value) -> Option<&str> {
    TYPE_TAG_FIELDS
        .iter()
        .find_map(|field| raw.get(*field).and_then(Value::as_str))
}

/// Evidence that made a turn count as tool-sourced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceSignal {
    /// A trace type tag named a tool category.
    TraceType(String),
    /// A `provider` field mentioned the adapter family.
    Provider(String),
    /// A keyword appeared in nested trace metadata.
    MetadataKeyword(String),
    /// A keyword appeared somewhere in the raw event.
    PayloadKeyword(String),
}

impl fmt::Display for ProvenanceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TraceType(tag) => write!(f, "trace type `{tag}`"),
            Self::Provider(provider) => write!(f, "provider `{provider}`"),
            Self::MetadataKeyword(keyword) => write!(f, "metadata keyword `{keyword}`"),
            Self::PayloadKeyword(keyword) => write!(f, "payload keyword `{keyword}`"),
        }
    }
}

/// Where the turn's answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Produced by the agent without tools or retrieval.
    AgentNative,
    /// Grounded in knowledge base passages.
    KnowledgeBase,
    /// Produced with help from a tool adapter.
    ToolSourced(ProvenanceSignal),
}

impl Provenance {
    /// Returns `true` when the output must be re-screened.
    #[must_use]
    pub fn is_tool_sourced(&self) -> bool {
        matches!(self, Self::ToolSourced(_))
    }

    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AgentNative => "agent",
            Self::KnowledgeBase => "knowledge_base",
            Self::ToolSourced(_) => "tool",
        }
    }
}

/// Layered keyword detector for tool-sourced output.
#[derive(Debug, Clone)]
pub struct ProvenanceDetector {
    keywords: Vec<String>,
}

impl Default for ProvenanceDetector {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|kw| (*kw).to_owned()).collect(),
        }
    }
}

impl ProvenanceDetector {
    /// Adds keywords, typically the names of bootstrapped tools. Matching is
    /// case-insensitive and blank keywords are ignored.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    /// Keywords in matching order.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Inspects one raw event. `trace` is the event's trace record when it
    /// has one.
    #[must_use]
    pub fn inspect(&self, trace: Option<&TraceEvent>, payload: &Value) -> Option<ProvenanceSignal> {
        if let Some(trace) = trace {
            if let TraceEvent::ToolInvocation { tag, .. } = trace {
                return Some(ProvenanceSignal::TraceType(tag.clone()));
            }
            if let Some(provider) = provider_signal(trace.raw()) {
                return Some(provider);
            }
            if let Some(keyword) = self.metadata_keyword(trace.raw()) {
                return Some(ProvenanceSignal::MetadataKeyword(keyword));
            }
        }
        self.keyword_in(payload).map(ProvenanceSignal::PayloadKeyword)
    }

    fn metadata_keyword(&self, trace: &Value) -> Option<String> {
        let found = walk(trace, &mut |node| match node {
            Node::Field(key, nested) if METADATA_FIELDS.contains(&key) => {
                match self.keyword_in(nested) {
                    Some(keyword) => ControlFlow::Break(keyword),
                    None => ControlFlow::Continue(()),
                }
            }
            _ => ControlFlow::Continue(()),
        });
        match found {
            ControlFlow::Break(keyword) => Some(keyword),
            ControlFlow::Continue(()) => None,
        }
    }

    /// Searches both field names and string leaves.
    fn keyword_in(&self, value: &Value) -> Option<String> {
        let found = walk(value, &mut |node| {
            let text = match node {
                Node::Field(key, _) => key,
                Node::Text(text) => text,
            };
            match self.match_keyword(text) {
                Some(keyword) => ControlFlow::Break(keyword.to_owned()),
                None => ControlFlow::Continue(()),
            }
        });
        match found {
            ControlFlow::Break(keyword) => Some(keyword),
            ControlFlow::Continue(()) => None,
        }
    }

    fn match_keyword(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

fn provider_signal(trace: &Value) -> Option<ProvenanceSignal> {
    let found = walk(trace, &mut |node| match node {
        Node::Field("provider", Value::String(provider))
            if provider.to_lowercase().contains(ADAPTER_FAMILY) =>
        {
            ControlFlow::Break(provider.clone())
        }
        _ => ControlFlow::Continue(()),
    });
    match found {
        ControlFlow::Break(provider) => Some(ProvenanceSignal::Provider(provider)),
        ControlFlow::Continue(()) => None,
    }
}
