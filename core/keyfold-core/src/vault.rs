//! Vaults: a shared container carrying the user's encrypted records.
//!
//! The record encoding is opaque here - the payload is whatever serialized
//! list the client hands over. Accessors may be accounts or groups.

use crate::container::{Accessor, AccessorEntry, ActiveAccessor, SharedContainer};
use crate::error::Result;
use crate::marshal::Storable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container of encrypted records, shared directly or through groups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    pub name: String,
    /// Owning org, referenced by id only.
    pub org: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    container: SharedContainer,
}

/// The id + name summary an org keeps for each of its vaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    pub id: String,
    pub name: String,
}

impl Vault {
    pub fn new(name: &str, org: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            org,
            created_at: now,
            updated_at: now,
            container: SharedContainer::new(crate::random_id()),
        }
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// Seals the serialized record list.
    pub fn set_records(&mut self, records: &[u8]) -> Result<()> {
        self.container.set_data(records)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Opens the serialized record list. Requires a prior `access`.
    pub fn records(&self) -> Result<Vec<u8>> {
        self.container.get_data()
    }

    pub fn access(&mut self, accessor: &dyn ActiveAccessor) -> Result<()> {
        self.container.access(accessor)
    }

    pub fn update_accessors(&mut self, accessors: &[&dyn Accessor]) -> Result<()> {
        self.container.update_accessors(accessors)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn rotate_key(&mut self) -> Result<()> {
        self.container.rotate_key()?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn lock(&mut self) {
        self.container.lock();
    }

    pub fn is_unlocked(&self) -> bool {
        self.container.is_unlocked()
    }

    pub fn accessors(&self) -> &[AccessorEntry] {
        self.container.accessors()
    }

    pub fn has_accessor(&self, id: &str) -> bool {
        self.container.has_accessor(id)
    }

    pub fn summary(&self) -> VaultSummary {
        VaultSummary {
            id: self.container.id().to_string(),
            name: self.name.clone(),
        }
    }
}

impl Storable for Vault {
    const KIND: &'static str = "vault";
    fn id(&self) -> &str {
        self.container.id()
    }
}
