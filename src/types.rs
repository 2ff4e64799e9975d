//! Core types for the switchboard expert pipeline.
//!
//! This module defines the fundamental types used throughout the system for
//! identifying experts and describing how they answer. These are the core
//! domain concepts that define what the pipeline *is*.
//!
//! For routing decision types (outcomes, ranked candidates), see
//! [`crate::router`].
//!
//! # Key Types
//!
//! - [`ExpertKind`]: Identifies the specialized experts a query can route to
//! - [`ExpertCapability`]: Describes how an expert produces its answers
//!
//! # Examples
//!
//! ```rust
//! use switchboard::types::{ExpertKind, ExpertCapability};
//!
//! // The registry of experts is a closed set
//! let inventory = ExpertKind::Inventory;
//! assert_eq!(inventory.as_str(), "inventory");
//!
//! // Tie-breaks between equally-scored experts follow a fixed priority
//! assert!(ExpertKind::Inventory.priority() < ExpertKind::General.priority());
//!
//! // Capabilities distinguish document-grounded from live-data experts
//! let cap = ExpertCapability::LiveApi;
//! println!("answers via {cap}");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a specialized expert within the pipeline.
///
/// `ExpertKind` is a closed set: the four experts cover datacenter inventory,
/// network fabric state, AI-hardware documentation, and general knowledge.
/// Routing always resolves to one of these (general absorbs everything the
/// other three decline).
///
/// # Ordering
///
/// When two experts score identically for a query, the tie is broken by
/// [`priority`](Self::priority): inventory wins over network fabric, which
/// wins over hardware docs, which wins over general. [`ExpertKind::ALL`]
/// lists the kinds in that order.
///
/// # Persistence
///
/// `ExpertKind` serializes to its kebab-case name (`"network-fabric"`) via
/// serde, and the same names round-trip through
/// [`as_str`](Self::as_str)/[`parse`](Self::parse).
///
/// # Examples
///
/// ```rust
/// use switchboard::types::ExpertKind;
///
/// let kind = ExpertKind::NetworkFabric;
/// assert_eq!(kind.as_str(), "network-fabric");
/// assert_eq!(ExpertKind::parse("network-fabric"), Some(kind));
/// assert_eq!(ExpertKind::parse("weather"), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpertKind {
    /// Datacenter inventory: servers, VMs, firmware, health alerts.
    ///
    /// Backed by a live management-API collaborator rather than documents.
    Inventory,

    /// Network fabric state: sites, devices, telemetry, alarms, workflows.
    ///
    /// Backed by a live fabric-controller collaborator rather than documents.
    NetworkFabric,

    /// AI-hardware documentation: specs, configuration guides, datasheets.
    ///
    /// Answers from an indexed document corpus via retrieval.
    HardwareDocs,

    /// General knowledge, and the fallback of last resort.
    ///
    /// Every query the other experts cannot serve ends here.
    General,
}

impl ExpertKind {
    /// All kinds in tie-break priority order (most specific first).
    pub const ALL: [ExpertKind; 4] = [
        ExpertKind::Inventory,
        ExpertKind::NetworkFabric,
        ExpertKind::HardwareDocs,
        ExpertKind::General,
    ];

    /// The stable kebab-case name used in logs, events, and responses.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use switchboard::types::ExpertKind;
    /// assert_eq!(ExpertKind::Inventory.as_str(), "inventory");
    /// assert_eq!(ExpertKind::HardwareDocs.as_str(), "hardware-docs");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertKind::Inventory => "inventory",
            ExpertKind::NetworkFabric => "network-fabric",
            ExpertKind::HardwareDocs => "hardware-docs",
            ExpertKind::General => "general",
        }
    }

    /// Parse a stable name back into a kind.
    ///
    /// Unlike string conversion in open registries, unknown names return
    /// `None` rather than inventing a variant: the expert set is closed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use switchboard::types::ExpertKind;
    /// assert_eq!(ExpertKind::parse("general"), Some(ExpertKind::General));
    /// assert_eq!(ExpertKind::parse("Custom:foo"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inventory" => Some(ExpertKind::Inventory),
            "network-fabric" => Some(ExpertKind::NetworkFabric),
            "hardware-docs" => Some(ExpertKind::HardwareDocs),
            "general" => Some(ExpertKind::General),
            _ => None,
        }
    }

    /// Tie-break rank: lower wins when router scores are equal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use switchboard::types::ExpertKind;
    /// let mut kinds = vec![ExpertKind::General, ExpertKind::Inventory];
    /// kinds.sort_by_key(|k| k.priority());
    /// assert_eq!(kinds[0], ExpertKind::Inventory);
    /// ```
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            ExpertKind::Inventory => 0,
            ExpertKind::NetworkFabric => 1,
            ExpertKind::HardwareDocs => 2,
            ExpertKind::General => 3,
        }
    }

    /// Returns `true` if this is the [`General`](Self::General) expert.
    #[must_use]
    pub fn is_general(&self) -> bool {
        matches!(self, Self::General)
    }
}

impl fmt::Display for ExpertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Describes how an expert produces its answers.
///
/// The capability drives what the orchestrator can expect from a given
/// expert: document-grounded experts return citations, live-API experts
/// depend on an external collaborator being reachable, and model-only
/// experts always produce *something*.
///
/// # Examples
///
/// ```rust
/// use switchboard::types::ExpertCapability;
///
/// let cap = ExpertCapability::RagBacked;
/// assert_eq!(cap.to_string(), "rag-backed");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpertCapability {
    /// Retrieves indexed document chunks and answers grounded in them.
    ///
    /// Answers carry citations for exactly the excerpts placed in context.
    RagBacked,

    /// Queries a live external API and formats structured results.
    ///
    /// When the collaborator is unreachable the expert fails fast so the
    /// orchestrator can fall back.
    LiveApi,

    /// Answers from model knowledge alone, with no external grounding.
    ///
    /// Used by the general expert when no document index is configured.
    ModelOnly,
}

impl fmt::Display for ExpertCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RagBacked => write!(f, "rag-backed"),
            Self::LiveApi => write!(f, "live-api"),
            Self::ModelOnly => write!(f, "model-only"),
        }
    }
}
