use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

use crate::config::CONFIG;

// The client timeout is the only deadline on a generation call.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(CONFIG.http_timeout_seconds))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
