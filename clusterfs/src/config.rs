use crate::error::{Result, VfsError};
use crate::meta::codec::{COUNT_WIDTH, MAX_NUMBER};

/// Volume options
#[derive(Debug, Clone)]
pub struct VfsConfig {
    /// Payload bytes per cluster. Only used when a new VFS is initialized;
    /// an existing VFS keeps the size stored in its header.
    pub cluster_size: u64,
    /// Maximum number of live handles per file
    pub max_handles: u32,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            cluster_size: 10,
            max_handles: 20,
        }
    }
}

impl VfsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_size == 0 {
            return Err(VfsError::InvalidConfig(
                "cluster_size must be greater than zero".into(),
            ));
        }
        if self.cluster_size > MAX_NUMBER as u64 {
            return Err(VfsError::InvalidConfig(format!(
                "cluster_size {} does not fit the header field",
                self.cluster_size
            )));
        }
        let count_limit = 10u32.pow(COUNT_WIDTH as u32) - 1;
        if self.max_handles == 0 || self.max_handles > count_limit {
            return Err(VfsError::InvalidConfig(format!(
                "max_handles must be within 1..={count_limit}, got {}",
                self.max_handles
            )));
        }
        Ok(())
    }
}
