use redact::Secret;

/// Default ceiling on connections in existence.
pub(crate) const DEFAULT_MAX_OPEN: usize = 10;
/// Default ceiling on idle connections retained for reuse.
pub(crate) const DEFAULT_MAX_IDLE: usize = 2;

/// Immutable settings for a [`ConnectionPool`](super::ConnectionPool).
///
/// `PoolConfig` can only be obtained through [`PoolConfig::new`], which enforces
/// `max_idle <= max_open` and `max_open >= 1`, and checks that the url parses.
/// An idle capacity of zero is allowed: the pool then closes every returned connection.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    max_open: usize,
    max_idle: usize,
    url: Secret<String>,
}

/// The pool limits do not describe a usable pool.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPoolConfig {
    #[error("`max_open` must allow at least one connection")]
    NoConnectionsAllowed,
    #[error("`max_idle` ({max_idle}) cannot exceed `max_open` ({max_open})")]
    IdleExceedsOpen { max_idle: usize, max_open: usize },
    #[error("The broker url is not a valid url")]
    Url(#[from] url::ParseError),
}

impl PoolConfig {
    /// Validate the limits and build a `PoolConfig`.
    pub fn new(
        max_open: usize,
        max_idle: usize,
        url: impl Into<String>,
    ) -> Result<Self, InvalidPoolConfig> {
        if max_open == 0 {
            return Err(InvalidPoolConfig::NoConnectionsAllowed);
        }
        if max_idle > max_open {
            return Err(InvalidPoolConfig::IdleExceedsOpen { max_idle, max_open });
        }
        let url = url.into();
        url::Url::parse(&url)?;
        Ok(Self {
            max_open,
            max_idle,
            url: Secret::from(url),
        })
    }

    /// Hard ceiling on connections in existence, idle and checked out combined.
    pub fn max_open(&self) -> usize {
        self.max_open
    }

    /// Ceiling on idle connections kept around for reuse.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// The broker URL, credentials included.
    pub fn url(&self) -> &Secret<String> {
        &self.url
    }
}
