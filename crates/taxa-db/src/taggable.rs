//! In-memory tagged-entity facade.
//!
//! [`TaggedEntity`] wraps an external entity reference and buffers desired
//! tag lists per scheme (and per owner) until `save`, the way a host
//! object model defers tag writes to its own save hook. Loaded lists are
//! cached for the lifetime of the instance and dropped on `reload`.

use std::collections::HashMap;

use uuid::Uuid;

use taxa_core::{Result, TagList, TaggableRef, TaggerRef};

use crate::taggings::TaggingRepository;
use crate::Database;

/// A taggable entity with buffered tag-list edits and a per-scheme read
/// cache.
#[derive(Debug, Clone)]
pub struct TaggedEntity {
    taggable: TaggableRef,
    pending: HashMap<String, TagList>,
    pending_owned: Vec<(TaggerRef, String, TagList)>,
    cached: HashMap<String, TagList>,
}

impl TaggedEntity {
    /// Wrap an entity of the given type.
    pub fn new(taggable_type: impl Into<String>, taggable_id: Uuid) -> Self {
        Self {
            taggable: TaggableRef::new(taggable_type, taggable_id),
            pending: HashMap::new(),
            pending_owned: Vec::new(),
            cached: HashMap::new(),
        }
    }

    /// The wrapped entity reference.
    pub fn taggable(&self) -> &TaggableRef {
        &self.taggable
    }

    /// Buffer a desired tag list for a scheme; applied on `save`.
    pub fn set_tag_list(&mut self, scheme_name: impl Into<String>, list: TagList) {
        self.pending.insert(scheme_name.into(), list);
    }

    /// Buffer a desired owner-scoped tag list; applied on `save`.
    pub fn set_owner_tag_list(
        &mut self,
        owner: TaggerRef,
        scheme_name: impl Into<String>,
        list: TagList,
    ) {
        let scheme_name = scheme_name.into();
        self.pending_owned
            .retain(|(o, s, _)| !(o == &owner && s == &scheme_name));
        self.pending_owned.push((owner, scheme_name, list));
    }

    /// The entity's tag list for a scheme: a pending edit if one is
    /// buffered, else the cached load, else a fresh read (cached after).
    pub async fn tag_list(&mut self, db: &Database, scheme_name: &str) -> Result<TagList> {
        if let Some(list) = self.pending.get(scheme_name) {
            return Ok(list.clone());
        }
        if let Some(list) = self.cached.get(scheme_name) {
            return Ok(list.clone());
        }

        let list = db.taggings.tag_list(&self.taggable, scheme_name).await?;
        self.cached.insert(scheme_name.to_string(), list.clone());
        Ok(list)
    }

    /// Flush every buffered list through the reconciler.
    pub async fn save(&mut self, db: &Database) -> Result<()> {
        for (scheme_name, list) in std::mem::take(&mut self.pending) {
            db.taggings
                .set_tag_list(&self.taggable, &scheme_name, &list)
                .await?;
            self.cached.insert(scheme_name, list);
        }

        for (owner, scheme_name, list) in std::mem::take(&mut self.pending_owned) {
            db.taggings
                .set_owner_tag_list(&self.taggable, &owner, &scheme_name, &list)
                .await?;
        }

        Ok(())
    }

    /// Drop cached and pending lists, as a host model does when the
    /// backing row is reloaded.
    pub fn reload(&mut self) {
        self.pending.clear();
        self.pending_owned.clear();
        self.cached.clear();
    }
}
