//! Shared utility modules used across Pokembed components.

pub mod simd;
