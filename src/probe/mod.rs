//! Probing candidates over HTTP and persisting what was found

pub mod archive;
pub mod sink;
pub mod validator;

pub use archive::DirectoryArchiver;
pub use sink::{read_log, ResultSink};
pub use validator::Validator;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Destination for bodies of successfully probed URLs
#[async_trait]
pub trait ContentArchiver: Send + Sync {
    /// Store `body` retrieved from `url`, returning the written file
    async fn archive(&self, url: &str, body: &[u8]) -> Result<PathBuf>;

    /// Run-scoped directory under which everything is stored
    fn root(&self) -> &Path;
}
