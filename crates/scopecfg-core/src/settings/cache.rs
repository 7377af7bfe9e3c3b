//! LRU cache for resolved settings

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use super::service::ResolvedSetting;
use crate::prelude::*;

type CacheKey = (Box<str>, ScopeContext);

/// Cache of effective values keyed by (setting key, scope context)
///
/// Every invalidation bumps a generation counter. A resolution records the generation
/// before it reads storage and its result is only stored if no invalidation happened
/// in between, so a read that raced a mutation cannot put a stale value back.
pub struct ResolveCache {
	inner: Mutex<Inner>,
}

struct Inner {
	lru: LruCache<CacheKey, ResolvedSetting>,
	generation: u64,
}

impl ResolveCache {
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self { inner: Mutex::new(Inner { lru: LruCache::new(capacity), generation: 0 }) }
	}

	pub fn generation(&self) -> u64 {
		self.inner.lock().generation
	}

	pub fn get(&self, key: &str, ctx: &ScopeContext) -> Option<ResolvedSetting> {
		let mut inner = self.inner.lock();
		inner.lru.get(&(Box::from(key), *ctx)).cloned()
	}

	/// Store a resolution made at `generation`. Dropped if the cache was invalidated since.
	pub fn put(&self, generation: u64, key: &str, ctx: ScopeContext, value: ResolvedSetting) {
		let mut inner = self.inner.lock();
		if inner.generation == generation {
			inner.lru.put((key.into(), ctx), value);
		}
	}

	/// Drop every cached resolution of a key
	pub fn invalidate_key(&self, key: &str) {
		let mut inner = self.inner.lock();
		inner.generation += 1;
		let stale: Vec<CacheKey> =
			inner.lru.iter().filter(|((k, _), _)| **k == *key).map(|(k, _)| k.clone()).collect();
		for k in stale {
			inner.lru.pop(&k);
		}
	}

	pub fn clear(&self) {
		let mut inner = self.inner.lock();
		inner.generation += 1;
		inner.lru.clear();
	}
}


// vim: ts=4
