//! Carta Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Carta map
//! composition pipeline and its renderers. It includes:
//!
//! - **Colors**: Color handling with CSS color support ([`color::Color`])
//! - **Geometry**: Map extents and pixel metrics ([`geometry`] module)
//! - **Features**: Tagged geographic records ([`feature`] module)
//! - **Draw**: Z-ordered render layers and stroke definitions ([`draw`] module)

pub mod color;
pub mod draw;
pub mod feature;
pub mod geometry;
