pub mod error;
pub mod links;
pub mod normalize;
pub mod requester;
pub mod response;
pub mod soft404;

pub use error::ScanError;
pub use normalize::{clean_path, host_key, normalize_url};
pub use requester::{ClientOptions, Requester, build_client};
pub use response::ProbeResponse;
pub use soft404::detect_soft_404;
