//! Field arithmetic shared by the secret sharing layer.

pub mod gf256;
