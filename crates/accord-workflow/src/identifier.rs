use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Strategy for minting fresh RFC identifiers. The identifier doubles as the
/// workspace branch name, so it must be branch-safe.
///
/// An injectable function value rather than a global, so tests can substitute
/// deterministic identifiers without races.
#[derive(Clone)]
pub struct IdentifierSource(Arc<dyn Fn() -> String + Send + Sync>);

impl IdentifierSource {
    pub fn new(mint: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(mint))
    }

    pub fn mint(&self) -> String {
        (self.0)()
    }
}

impl Default for IdentifierSource {
    /// Current unix-epoch seconds.
    fn default() -> Self {
        Self::new(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default()
                .to_string()
        })
    }
}

impl fmt::Debug for IdentifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentifierSource(..)")
    }
}
