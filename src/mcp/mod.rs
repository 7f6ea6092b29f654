pub mod http;
pub mod server;

pub use http::run_http_server;
pub use server::{run_server, RerankMcpServer, SearchAndRerankParams};
