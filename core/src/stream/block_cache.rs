// Block cache over an expensive stream
// Pages are `block_size` aligned and held in an LRU bounded by the read cache
// budget. Writes go straight to the inner stream; the cache only mirrors it.

use super::{Extent, SparseStream};
use crate::config::BlockCacheSettings;
use crate::StrataError;
use log::{debug, trace};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCacheStatistics {
    pub total_reads_in: u64,
    pub read_cache_hits: u64,
    pub read_cache_misses: u64,
    /// Reads that bypassed the cache because of their size.
    pub large_reads_in: u64,
    pub unaligned_reads_in: u64,
    pub total_writes: u64,
    pub cached_blocks: usize,
}

pub struct BlockCacheStream<S> {
    inner: S,
    settings: BlockCacheSettings,
    cache: LruCache<u64, Vec<u8>>,
    stats: BlockCacheStatistics,
}

impl<S: SparseStream> BlockCacheStream<S> {
    pub fn new(inner: S, settings: BlockCacheSettings) -> Result<Self, StrataError> {
        settings.validate()?;
        let capacity = NonZeroUsize::new(settings.capacity_blocks()).ok_or_else(|| {
            StrataError::Configuration("block cache has no room for a page".to_string())
        })?;
        debug!(
            "Block cache: {} pages of {} bytes, large reads from {} bytes",
            capacity, settings.block_size, settings.large_read_size
        );
        Ok(Self {
            inner,
            settings,
            cache: LruCache::new(capacity),
            stats: BlockCacheStatistics::default(),
        })
    }

    pub fn stats(&self) -> BlockCacheStatistics {
        BlockCacheStatistics {
            cached_blocks: self.cache.len(),
            ..self.stats.clone()
        }
    }

    pub fn settings(&self) -> &BlockCacheSettings {
        &self.settings
    }

    /// Drop every cached page. The inner stream is unaffected.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn block_size(&self) -> u64 {
        self.settings.block_size as u64
    }

    fn load_block(&mut self, block: u64) -> Result<(), StrataError> {
        let block_size = self.block_size();
        let page_start = block * block_size;
        let page_len = self.inner.len().saturating_sub(page_start).min(block_size) as usize;

        // Reuse the evicted page's allocation when the cache is full.
        let mut page = if self.cache.len() >= self.cache.cap().get() {
            self.cache.pop_lru().map(|(_, page)| page).unwrap_or_default()
        } else {
            Vec::with_capacity(block_size as usize)
        };
        page.resize(page_len, 0);
        self.inner.read_at(page_start, &mut page)?;
        trace!("Cached block {} ({} bytes)", block, page_len);
        self.cache.push(block, page);
        Ok(())
    }
}

impl<S: SparseStream> SparseStream for BlockCacheStream<S> {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn can_write(&self) -> bool {
        self.inner.can_write()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StrataError> {
        StrataError::check_range(offset, buf.len() as u64, self.inner.len())?;
        self.stats.total_reads_in += 1;

        if buf.len() as u64 >= self.settings.large_read_size {
            self.stats.large_reads_in += 1;
            return self.inner.read_at(offset, buf);
        }

        let block_size = self.block_size();
        if offset % block_size != 0 || buf.len() as u64 % block_size != 0 {
            self.stats.unaligned_reads_in += 1;
        }

        let mut done = 0usize;
        while done < buf.len() {
            let position = offset + done as u64;
            let block = position / block_size;
            let within = (position - block * block_size) as usize;
            let count = (block_size as usize - within).min(buf.len() - done);

            if self.cache.contains(&block) {
                self.stats.read_cache_hits += 1;
            } else {
                self.stats.read_cache_misses += 1;
                self.load_block(block)?;
            }
            let page = self.cache.get(&block).ok_or_else(|| {
                StrataError::InvalidInput(format!("block {} missing from cache", block))
            })?;
            buf[done..done + count].copy_from_slice(&page[within..within + count]);
            done += count;
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StrataError> {
        self.inner.write_at(offset, data)?;
        self.stats.total_writes += 1;
        if data.is_empty() {
            return Ok(());
        }

        let block_size = self.block_size();
        let end = offset + data.len() as u64;
        for block in offset / block_size..=(end - 1) / block_size {
            let page_start = block * block_size;
            let lo = offset.max(page_start);
            let hi = end.min(page_start + block_size);
            let stale = match self.cache.peek_mut(&block) {
                Some(page) if (hi - page_start) as usize <= page.len() => {
                    page[(lo - page_start) as usize..(hi - page_start) as usize]
                        .copy_from_slice(&data[(lo - offset) as usize..(hi - offset) as usize]);
                    false
                }
                Some(_) => true,
                None => false,
            };
            // A short tail page that the write extended is simply reloaded later.
            if stale {
                self.cache.pop(&block);
            }
        }
        Ok(())
    }

    fn set_length(&mut self, length: u64) -> Result<(), StrataError> {
        self.inner.set_length(length)?;
        self.cache.clear();
        Ok(())
    }

    fn extents(&self) -> Vec<Extent> {
        self.inner.extents()
    }

    fn extents_in_range(&self, offset: u64, length: u64) -> Vec<Extent> {
        self.inner.extents_in_range(offset, length)
    }

    fn flush(&mut self) -> Result<(), StrataError> {
        self.inner.flush()
    }
}
