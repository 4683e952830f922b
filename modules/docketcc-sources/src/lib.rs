//! Filing sources for DocketCC. `EcfsSource` talks to the FCC's public
//! ECFS API; `fetch_many` fans a poll out over several dockets.

pub mod batch;
pub mod ecfs;
pub mod error;
pub mod normalize;
pub mod source;

pub use batch::{fetch_many, BatchFetch, DocketFetchError};
pub use ecfs::EcfsSource;
pub use error::{Result, SourceError};
pub use normalize::{normalize_filing, normalize_response};
pub use source::FilingSource;
