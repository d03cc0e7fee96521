//! Buffer pool configuration.

use quill_common::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE, DEFAULT_REPLACER_K, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames in the buffer pool.
    pub pool_size: usize,
    /// Page size in bytes.
    pub page_size: usize,
    /// Recency horizon K for the LRU-K replacer.
    pub replacer_k: usize,
}

impl BufferPoolConfig {
    /// Creates a new configuration with the specified number of frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            page_size: DEFAULT_PAGE_SIZE,
            replacer_k: DEFAULT_REPLACER_K,
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the replacer's K.
    pub fn with_replacer_k(mut self, replacer_k: usize) -> Self {
        self.replacer_k = replacer_k;
        self
    }

    /// Returns the total memory used by the frame buffers.
    pub fn memory_usage(&self) -> usize {
        self.pool_size * self.page_size
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size == 0 {
            return Err("pool_size must be > 0");
        }
        if !self.page_size.is_power_of_two() {
            return Err("page_size must be a power of 2");
        }
        if self.page_size < MIN_PAGE_SIZE {
            return Err("page_size must be >= 512");
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err("page_size must be <= 64 KiB");
        }
        if self.replacer_k == 0 {
            return Err("replacer_k must be >= 1");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = BufferPoolConfig::new(1000);
        assert_eq!(config.pool_size, 1000);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.replacer_k, DEFAULT_REPLACER_K);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BufferPoolConfig::new(100)
            .with_page_size(16384)
            .with_replacer_k(3);

        assert_eq!(config.page_size, 16384);
        assert_eq!(config.replacer_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_usage() {
        let config = BufferPoolConfig::new(1000);
        assert_eq!(config.memory_usage(), 1000 * DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_validation() {
        assert!(BufferPoolConfig::new(0).validate().is_err());
        assert!(BufferPoolConfig::new(10)
            .with_page_size(1000)
            .validate()
            .is_err());
        assert!(BufferPoolConfig::new(10)
            .with_replacer_k(0)
            .validate()
            .is_err());
    }
}
