pub mod config;
pub mod error;
mod matcher;
mod name;
mod registry;
mod rolling;

pub use config::{ByteLimit, Config, Encoding, RawConfig};
pub use error::{ConfigError, WriteError};
pub use matcher::{matches, select};
pub use name::{bucket_start, compose, increment, parse, FileNameParts, DATE_FORMAT};
pub use registry::{RollingFile, RollingFileRegistry};
pub use rolling::{DirectoryLister, FsLister, RollingWriter};
