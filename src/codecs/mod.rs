//! Format decoders.
//!
//! Each module exposes a unit struct implementing [`crate::Decoder`];
//! [`crate::Registry::with_builtin`] registers them in the canonical order.
//! `ega` and `modex` hold plain decode functions for headerless dumps.

pub mod atari;
pub mod bmp;
pub mod c64;
pub mod dcx;
#[cfg(feature = "delegated")]
pub mod delegated;
pub mod ega;
#[cfg(feature = "exe-icons")]
pub mod exe;
pub mod ico;
pub mod lbm;
pub mod modex;
pub mod msp;
pub mod pcx;
pub mod pictor;
pub mod png;
pub mod pnm;
pub mod qoi;
pub mod sgi;
pub mod sunrast;
