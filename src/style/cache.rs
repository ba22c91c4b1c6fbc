//! Memoized style resolution.
//!
//! Cache key is `(descriptor fingerprint, base style id)`. Each entry keeps a copy of
//! the descriptor so a fingerprint collision is detected and resolved without caching
//! instead of returning the wrong style.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AssetPool, ResolvedStyle, StyleDescriptor};

/// Identity of a registered base (fallback) style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BaseStyleId(u32);

impl BaseStyleId {
    /// The `"default"` base every cache starts with.
    pub const DEFAULT: BaseStyleId = BaseStyleId(0);
}

pub const DEFAULT_BASE: &str = "default";

struct Entry {
    descriptor: StyleDescriptor,
    style: Arc<ResolvedStyle>,
}

pub struct StyleCache {
    assets: Arc<AssetPool>,
    bases: Vec<(Cow<'static, str>, Arc<ResolvedStyle>)>,
    resolved: HashMap<(u64, BaseStyleId), Entry>,
    hits: u64,
    misses: u64,
}

impl StyleCache {
    pub fn new(assets: Arc<AssetPool>) -> Self {
        let mut cache = Self {
            assets,
            bases: Vec::new(),
            resolved: HashMap::new(),
            hits: 0,
            misses: 0,
        };
        cache.register_base(DEFAULT_BASE, ResolvedStyle::default());
        cache
    }

    pub fn assets(&self) -> &Arc<AssetPool> {
        &self.assets
    }

    /// Register or replace a named fallback style.
    ///
    /// Replacing a base drops every style previously resolved against it.
    pub fn register_base(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        style: ResolvedStyle,
    ) -> BaseStyleId {
        let name = name.into();
        let style = Arc::new(self.attach_assets(style));
        if let Some(index) = self.bases.iter().position(|(n, _)| *n == name) {
            let id = BaseStyleId(index as u32);
            self.bases[index].1 = style;
            self.resolved.retain(|(_, base), _| *base != id);
            log::debug!("replaced base style `{name}`");
            return id;
        }
        let id = BaseStyleId(self.bases.len() as u32);
        self.bases.push((name, style));
        id
    }

    pub fn base_id(&self, name: &str) -> Option<BaseStyleId> {
        self.bases
            .iter()
            .position(|(n, _)| n == name)
            .map(|index| BaseStyleId(index as u32))
    }

    pub fn base(&self, id: BaseStyleId) -> &Arc<ResolvedStyle> {
        self.bases
            .get(id.0 as usize)
            .map_or(&self.bases[0].1, |(_, style)| style)
    }

    /// Resolve `descriptor` against the base style `fallback`.
    ///
    /// Equal descriptors resolved against the same base return the same `Arc`.
    pub fn resolve(
        &mut self,
        descriptor: &StyleDescriptor,
        fallback: BaseStyleId,
    ) -> Arc<ResolvedStyle> {
        if descriptor.is_empty() {
            return Arc::clone(self.base(fallback));
        }
        let key = (descriptor.fingerprint(), fallback);
        if let Some(entry) = self.resolved.get(&key) {
            if entry.descriptor == *descriptor {
                self.hits += 1;
                return Arc::clone(&entry.style);
            }
            log::debug!("style fingerprint collision on {:#x}", key.0);
            self.misses += 1;
            return Arc::new(self.derive(descriptor, fallback));
        }

        self.misses += 1;
        let style = Arc::new(self.derive(descriptor, fallback));
        log::trace!("resolved style {:#x} against base {:?}", key.0, fallback);
        self.resolved.insert(
            key,
            Entry {
                descriptor: *descriptor,
                style: Arc::clone(&style),
            },
        );
        style
    }

    /// Resolution as the render manager performs it: an element with no descriptor
    /// gets its renderer's base (if the renderer named one), otherwise nothing.
    pub fn resolve_for(
        &mut self,
        descriptor: Option<&StyleDescriptor>,
        base: Option<&str>,
    ) -> Option<Arc<ResolvedStyle>> {
        let base_id = base.map(|name| {
            self.base_id(name).unwrap_or_else(|| {
                log::warn!("unknown base style `{name}`, using `{DEFAULT_BASE}`");
                BaseStyleId::DEFAULT
            })
        });
        match (descriptor, base_id) {
            (Some(descriptor), base_id) => {
                Some(self.resolve(descriptor, base_id.unwrap_or(BaseStyleId::DEFAULT)))
            }
            (None, Some(base_id)) => Some(Arc::clone(self.base(base_id))),
            (None, None) => None,
        }
    }

    fn derive(&self, descriptor: &StyleDescriptor, fallback: BaseStyleId) -> ResolvedStyle {
        self.attach_assets(descriptor.overlay(self.base(fallback)))
    }

    fn attach_assets(&self, mut style: ResolvedStyle) -> ResolvedStyle {
        let (fill, mask) = style.asset_keys();
        style.fill = fill.map(|key| self.assets.resolve_asset(key));
        style.corner_mask = mask.map(|key| self.assets.resolve_asset(key));
        style
    }

    /// Forget every resolved style. Base styles and generated assets survive.
    pub fn clear(&mut self) {
        self.resolved.clear();
    }

    /// Re-fetch the assets of every base style, after the pool was disposed.
    pub(crate) fn reattach_bases(&mut self) {
        self.resolved.clear();
        for index in 0..self.bases.len() {
            let style = (*self.bases[index].1).clone();
            self.bases[index].1 = Arc::new(self.attach_assets(style));
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
