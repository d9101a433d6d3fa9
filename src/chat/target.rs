use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    CHAT_SEGMENT, DIRECT_HISTORY_SEGMENT, DIRECT_SEGMENT, GROUP_HISTORY_SEGMENT, GROUP_SEGMENT,
};
use crate::utils::HuddleError;

/// Kind of conversation a target points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    Direct,
    Group,
}

impl TargetKind {
    fn connection_segment(&self) -> &'static str {
        match self {
            Self::Direct => DIRECT_SEGMENT,
            Self::Group => GROUP_SEGMENT,
        }
    }
}

/// The conversation selected for live interaction
///
/// Immutable once built. A new selection replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationTarget {
    kind: TargetKind,
    identifier: String,
    display_name: String,
}

impl ConversationTarget {
    /// A one-to-one conversation with the user identified by `identity`
    pub fn direct(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Direct,
            identifier: identity.into(),
            display_name: display_name.into(),
        }
    }

    /// A group conversation; groups are identified by their name
    pub fn group(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: TargetKind::Group,
            identifier: name.clone(),
            display_name: name,
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_direct_with(&self, identity: &str) -> bool {
        self.kind == TargetKind::Direct && self.identifier == identity
    }

    /// Streaming connection address under `base`
    ///
    /// Direct: `<base>/personal/<identity>/`. Group: `<base>/group/<name>/`
    /// with the name percent-encoded as a path segment.
    pub fn connection_address(&self, base: &Url) -> Result<Url, HuddleError> {
        extend_path(base, &[self.kind.connection_segment(), &self.identifier])
    }

    /// REST endpoint holding this conversation's prior messages
    pub fn history_endpoint(&self) -> HistoryEndpoint {
        match self.kind {
            TargetKind::Direct => HistoryEndpoint::Direct {
                identity: self.identifier.clone(),
            },
            TargetKind::Group => HistoryEndpoint::Group {
                name: self.identifier.clone(),
            },
        }
    }
}

impl fmt::Display for ConversationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Direct => write!(f, "@{}", self.display_name),
            TargetKind::Group => write!(f, "#{}", self.display_name),
        }
    }
}

/// History endpoint flavours, one per target kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEndpoint {
    Direct { identity: String },
    Group { name: String },
}

impl HistoryEndpoint {
    /// Resolve against the REST base URL
    pub fn url(&self, api_base: &Url) -> Result<Url, HuddleError> {
        match self {
            Self::Direct { identity } => {
                extend_path(api_base, &[CHAT_SEGMENT, DIRECT_HISTORY_SEGMENT, identity])
            }
            Self::Group { name } => extend_path(
                api_base,
                &[CHAT_SEGMENT, GROUP_HISTORY_SEGMENT, name, DIRECT_HISTORY_SEGMENT],
            ),
        }
    }
}

/// Append path segments (percent-encoded) plus the trailing slash the server routes expect
pub(crate) fn extend_path(base: &Url, segments: &[&str]) -> Result<Url, HuddleError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| HuddleError::InvalidAddress(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Ok(url)
}

/// Holds the single active target, or none
#[derive(Debug, Default)]
pub struct TargetResolver {
    active: Option<ConversationTarget>,
}

impl TargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active target, returning the one it supersedes
    pub fn select(&mut self, target: ConversationTarget) -> Option<ConversationTarget> {
        self.active.replace(target)
    }

    pub fn clear(&mut self) -> Option<ConversationTarget> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&ConversationTarget> {
        self.active.as_ref()
    }
}
