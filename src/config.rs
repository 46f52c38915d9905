//! Session configuration.
//!
//! [`SessionConfig`] bundles the knobs of a [`PageSession`](crate::session::PageSession):
//! the controller's event queue capacity, the assembler's page cap and the
//! optional media base URL prefixed to every page locator. Values are
//! validated by [`SessionConfigBuilder::build`].

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::{assembler::DEFAULT_MAX_PAGES, controller::DEFAULT_EVENT_CAPACITY};

/// Highest supported event queue capacity.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

/// Errors returned when building a [`SessionConfig`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The event capacity was zero or above [`MAX_EVENT_CAPACITY`].
    #[error("invalid event capacity {0}; must be between 1 and {max}", max = MAX_EVENT_CAPACITY)]
    InvalidCapacity(usize),
    /// The page cap was zero.
    #[error("max pages must be at least 1")]
    InvalidMaxPages,
    /// The media base was empty.
    #[error("media base url must not be empty")]
    EmptyMediaBase,
}

/// Validated session settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    event_capacity: usize,
    max_pages: NonZeroUsize,
    media_base: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_pages: DEFAULT_MAX_PAGES,
            media_base: None,
        }
    }
}

impl SessionConfig {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder { SessionConfigBuilder::default() }

    /// Capacity of the controller's event queue.
    #[must_use]
    pub fn event_capacity(&self) -> usize { self.event_capacity }

    /// Largest page total the assembler accepts.
    #[must_use]
    pub fn max_pages(&self) -> NonZeroUsize { self.max_pages }

    /// Base URL prefixed to page locators, if any.
    #[must_use]
    pub fn media_base(&self) -> Option<&str> { self.media_base.as_deref() }
}

/// Builder for [`SessionConfig`].
///
/// # Examples
///
/// ```
/// use pagestream::config::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .event_capacity(16)
///     .media_base("http://localhost:8000/media")
///     .build()
///     .expect("valid config");
/// assert_eq!(config.event_capacity(), 16);
/// assert_eq!(config.media_base(), Some("http://localhost:8000/media"));
/// ```
#[derive(Clone, Debug)]
pub struct SessionConfigBuilder {
    event_capacity: usize,
    max_pages: usize,
    media_base: Option<String>,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            event_capacity: defaults.event_capacity,
            max_pages: defaults.max_pages.get(),
            media_base: defaults.media_base,
        }
    }
}

impl SessionConfigBuilder {
    /// Capacity of the event queue between forwarding task and session.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Largest page total accepted before fragments are rejected.
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    /// Prefix page locators with `base`.
    #[must_use]
    pub fn media_base(mut self, base: impl Into<String>) -> Self {
        self.media_base = Some(base.into());
        self
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is out of range.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ConfigError::InvalidCapacity(self.event_capacity));
        }
        let max_pages = NonZeroUsize::new(self.max_pages).ok_or(ConfigError::InvalidMaxPages)?;
        if self.media_base.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyMediaBase);
        }
        Ok(SessionConfig {
            event_capacity: self.event_capacity,
            max_pages,
            media_base: self.media_base,
        })
    }
}
