pub mod cat;
pub mod gc;
pub mod init;
pub mod install;
pub mod list;
pub mod locate;

pub use cat::cat;
pub use gc::gc;
pub use init::init;
pub use install::{InstallOptions, InstallResult, install};
pub use list::{ListedPackage, list};
pub use locate::locate;
