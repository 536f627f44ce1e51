mod directory;
mod writer;

pub use self::directory::{DirectoryLister, FsLister};
pub use self::writer::RollingWriter;
