use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Proxy endpoint bound to a crawl run.
///
/// Selected once at run start and held for the run's lifetime - never
/// mutated mid-run. Concurrent runs each carry their own binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyBinding {
    addr: String,
}

impl ProxyBinding {
    /// Create a binding from a `host:port` string
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// The raw `host:port` form
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The URL form accepted by HTTP client builders
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The Chromium launch-argument form
    pub fn server_arg(&self) -> String {
        format!("--proxy-server={}", self.addr)
    }
}

/// Picks one proxy from the configured pool, uniformly at random.
///
/// Returns `None` for an empty pool, meaning a direct connection.
pub fn choose_proxy(pool: &[String]) -> Option<ProxyBinding> {
    let addr = pool.choose(&mut rand::thread_rng())?;
    ::log::info!("Selected proxy {} from a pool of {}", addr, pool.len());
    Some(ProxyBinding::new(addr))
}
