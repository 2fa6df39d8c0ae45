// Differencing chain resolution
// Images are looked up by identity; each child is linked to the parent it
// declares until an image without a parent is reached.

use super::allocator::{BlockSource, SharedBlockSource};
use log::{debug, info};
use std::collections::HashMap;
use strata_core::config::DEFAULT_MAX_CHAIN_DEPTH;
use strata_core::StrataError;
use uuid::Uuid;

pub struct ImageCatalog {
    images: HashMap<Uuid, SharedBlockSource>,
    max_chain_depth: usize,
}

impl ImageCatalog {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Add an image under its own identity.
    pub fn insert(&mut self, image: SharedBlockSource) {
        let identity = image.borrow().identity();
        debug!("Catalogued image {}", identity);
        self.images.insert(identity, image);
    }

    pub fn get(&self, identity: &Uuid) -> Option<SharedBlockSource> {
        self.images.get(identity).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Link `leaf` to its ancestors. Returns the chain's identities, leaf first.
    ///
    /// A missing ancestor is `NotFound`; an identity mismatch is
    /// `InvalidChain`; a chain longer than the depth bound, or one that
    /// revisits an image, is `ChainTooDeep`.
    pub fn resolve(&self, leaf: &mut dyn BlockSource) -> Result<Vec<Uuid>, StrataError> {
        let mut chain = vec![leaf.identity()];
        let Some(first) = leaf.parent_identity() else {
            return Ok(chain);
        };
        let parent = self.next_link(&chain, first)?;
        leaf.attach_parent(parent.clone())?;
        chain.push(first);

        let mut current = parent;
        loop {
            let wanted = current.borrow().parent_identity();
            let Some(wanted) = wanted else {
                break;
            };
            let parent = self.next_link(&chain, wanted)?;
            current.borrow_mut().attach_parent(parent.clone())?;
            chain.push(wanted);
            current = parent;
        }

        info!("Resolved differencing chain of {} images", chain.len());
        Ok(chain)
    }

    fn next_link(&self, chain: &[Uuid], wanted: Uuid) -> Result<SharedBlockSource, StrataError> {
        if chain.len() > self.max_chain_depth || chain.contains(&wanted) {
            return Err(StrataError::ChainTooDeep {
                max_depth: self.max_chain_depth,
            });
        }
        self.get(&wanted)
            .ok_or_else(|| StrataError::NotFound(format!("parent image {}", wanted)))
    }
}

impl Default for ImageCatalog {
    fn default() -> Self {
        Self::new()
    }
}
