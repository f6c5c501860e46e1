//! Argus - cloud asset discovery and classification
//!
//! Discovers the resources of a cloud account across its region x service
//! matrix, normalizes each into a canonical [`Asset`], and classifies it by
//! environment, owner, data sensitivity and criticality.

pub mod asset;
pub mod classification;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod inventory;
pub mod normalizers;
pub mod output;
pub mod provider;

// Re-export commonly used types
pub use asset::{Asset, ResourceConfiguration, ResourceType, ServiceKind};
pub use classification::{classify, Classification, ClassificationRule, Criticality, RuleSet};
pub use config::EngineConfig;
pub use connection::{ConnectionTestResult, ConnectionValidator, RoleReference};
pub use discovery::{CellError, DiscoveryEngine, DiscoveryRequest, DiscoveryResult};
pub use error::ArgusError;
pub use inventory::{ClassifiedAsset, InventorySink, MemoryInventory};
pub use provider::{IdentityProbe, ResourceProvider};

pub type Result<T> = std::result::Result<T, ArgusError>;
