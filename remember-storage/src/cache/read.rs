//! Result of a cache-aside call.

/// Where the value of a [`CacheRead`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from the cache.
    Cache,
    /// Produced by the fallback (miss, fresh read, or cache disabled).
    Fallback,
}

/// Value returned by `cache`, together with whether it was a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    /// Create a cache read from a cache hit.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
        }
    }

    /// Create a cache read from a fallback result.
    pub fn from_fallback(value: T) -> Self {
        Self {
            value,
            source: ReadSource::Fallback,
        }
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    /// `true` when the value was found in the cache.
    pub fn found(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn was_cache_hit(&self) -> bool {
        self.found()
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.found()
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Split into `(value, found)`.
    pub fn into_parts(self) -> (T, bool) {
        let found = self.found();
        (self.value, found)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            source: self.source,
        }
    }
}
