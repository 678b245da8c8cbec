pub mod data_uri;
pub mod http;
pub mod logging;
pub mod timing;
