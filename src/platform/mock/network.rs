//! Mock access point recording state transitions

use crate::platform::error::{PlatformError, Result};
use crate::platform::traits::network::{AccessPointInterface, ApConfig};

/// Access point that records every transition instead of touching a radio.
#[derive(Debug, Default)]
pub struct MockAccessPoint {
    up: bool,
    start_count: u32,
    stop_count: u32,
    last_config: Option<ApConfig>,
    served_page: Option<&'static str>,
    fail_next_start: bool,
}

impl MockAccessPoint {
    pub fn new() -> MockAccessPoint {
        MockAccessPoint::default()
    }

    /// Make the next `start` fail with `InitializationFailed`.
    pub fn fail_next_start(&mut self) {
        self.fail_next_start = true;
    }

    /// Successful `start` calls so far.
    pub fn start_count(&self) -> u32 {
        self.start_count
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count
    }

    /// Configuration from the most recent successful start.
    pub fn last_config(&self) -> Option<&ApConfig> {
        self.last_config.as_ref()
    }

    pub fn served_page(&self) -> Option<&'static str> {
        self.served_page
    }
}

impl AccessPointInterface for MockAccessPoint {
    fn start(&mut self, config: &ApConfig) -> Result<()> {
        if self.fail_next_start {
            self.fail_next_start = false;
            return Err(PlatformError::InitializationFailed);
        }
        self.up = true;
        self.start_count += 1;
        self.last_config = Some(config.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.up = false;
        self.stop_count += 1;
        self.served_page = None;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.up
    }

    fn serve_index(&mut self, html: &'static str) -> Result<()> {
        if !self.up {
            return Err(PlatformError::ResourceUnavailable);
        }
        self.served_page = Some(html);
        Ok(())
    }
}
