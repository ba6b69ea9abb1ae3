pub mod data_loader_service;
pub mod host_session;
pub mod stdio_bridge;
pub mod transport;

pub use data_loader_service::{load_file, DataLoaderService, LoadedDocument};
pub use host_session::HostSession;
pub use transport::{channel_pair, DisplayEndpoint, HostEndpoint};
