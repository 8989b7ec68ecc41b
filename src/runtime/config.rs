/// Host configuration.
///
/// # Examples
///
/// ```
/// use tincan_bind::runtime::HostConfig;
///
/// let config = HostConfig::new().strict(true).store_churn_warning(8);
/// assert!(config.is_strict());
/// assert_eq!(config.churn_warning(), Some(8));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    strict: bool,
    max_renders_per_flush: usize,
    store_churn_warning: Option<usize>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_renders_per_flush: 10_000,
            store_churn_warning: None,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Double-invoke renders and simulate a detach/attach cycle after mount.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Upper bound on renders in one [`Host::flush`](super::Host::flush).
    pub fn max_renders_per_flush(mut self, limit: usize) -> Self {
        self.max_renders_per_flush = limit;
        self
    }

    /// Warn once a bridge has seen a new store on this many consecutive
    /// renders. Disabled by default. `0` is treated as `1`.
    pub fn store_churn_warning(mut self, renders: usize) -> Self {
        self.store_churn_warning = Some(renders.max(1));
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn render_limit(&self) -> usize {
        self.max_renders_per_flush
    }

    pub fn churn_warning(&self) -> Option<usize> {
        self.store_churn_warning
    }
}
