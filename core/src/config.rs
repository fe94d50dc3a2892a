//! Engine configuration
//!
//! Loaded from JSON by the front end; every field has a default so a partial
//! (or empty) document is valid.

use crate::types::ChannelId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of replies fetched per store page
pub const DEFAULT_REPLY_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WranglerConfig {
    /// Largest thread move/copy will accept; 0 means unlimited
    pub max_thread_size: usize,

    /// Offer and allow "Merge to Thread"
    pub merge_thread_enable: bool,

    /// Offer and allow "Attach to Thread"
    pub attach_message_enable: bool,

    /// Destination of "Copy to Channel"
    pub copy_target_channel: Option<ChannelId>,

    /// Replies requested per store page
    pub reply_page_size: usize,

    /// Delete originals after a successful move (if the host permits it)
    pub delete_moved_originals: bool,

    /// Leave a summary in the source channel after a move or copy
    pub notify_source_channel: bool,

    /// Leave a notice in the new thread after a move or copy
    pub notify_destination_thread: bool,

    /// Staged selections idle for longer than this are dropped by `expire`
    pub staging_max_idle_secs: Option<u64>,
}

impl Default for WranglerConfig {
    fn default() -> Self {
        Self {
            max_thread_size: 0,
            merge_thread_enable: true,
            attach_message_enable: true,
            copy_target_channel: None,
            reply_page_size: DEFAULT_REPLY_PAGE_SIZE,
            delete_moved_originals: true,
            notify_source_channel: true,
            notify_destination_thread: true,
            staging_max_idle_secs: None,
        }
    }
}

impl WranglerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reply_page_size == 0 {
            return Err(Error::Config("reply_page_size must be greater than zero".to_string()));
        }
        if self.staging_max_idle_secs == Some(0) {
            return Err(Error::Config(
                "staging_max_idle_secs must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Thread size limit, `None` when unlimited
    pub fn thread_size_limit(&self) -> Option<usize> {
        (self.max_thread_size > 0).then_some(self.max_thread_size)
    }

    pub fn staging_max_idle(&self) -> Option<Duration> {
        self.staging_max_idle_secs.map(Duration::from_secs)
    }
}
