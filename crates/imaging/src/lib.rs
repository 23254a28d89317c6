pub mod builder;
pub mod verify;

pub use builder::{ensure_image, staged_files, ImageBuilder, ImageSpec, STARTUP_SCRIPT};
pub use verify::{sha256_prefix, verify_written};
