pub mod config;
pub mod decode;
pub mod device;
pub mod output;
pub mod playback;
pub mod resample;

pub use output::CpalProvider;
