//! Reading and writing XACT wave banks (`.xwb`).
//!
//! [`wavebank::WaveBank`] decodes a whole bank, PCM payloads included, and
//! writes it back using a single fixed output profile.
pub mod ext;
pub mod types;
pub mod utils;
pub mod wavebank;

pub use wavebank::WaveBank;
pub use wavebank::error::{ErrorKind, XwbError};
