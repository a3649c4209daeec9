use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

const APP_USER_AGENT: &str = concat!("flowupdater/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout; generous because single artifacts can be
/// large, but bounded so a dead mirror cannot hang a run forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    // Identity encoding keeps Content-Length meaningful for size checks.
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .timeout(timeout)
        .build()
}
