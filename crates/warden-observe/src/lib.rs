mod logger;
pub use logger::*;

mod panic;
pub use panic::install_panic_hook;

#[cfg(feature = "subscriber")]
mod subscriber;
#[cfg(feature = "subscriber")]
pub use subscriber::*;
