pub mod body;
pub mod compartment_box;
pub mod compartment_container;
pub mod composition;
pub mod config;
pub mod error;
pub mod geometry;
pub mod init_config;
pub mod io;
pub mod profiler;
pub mod value_item;

#[cfg(feature = "profiling")]
use once_cell::sync::Lazy;
#[cfg(feature = "profiling")]
use parking_lot::Mutex;

#[cfg(feature = "profiling")]
pub static PROFILER: Lazy<Mutex<profiler::Profiler>> =
    Lazy::new(|| Mutex::new(profiler::Profiler::new()));
