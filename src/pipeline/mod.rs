//! Pipeline stages for article archiving.
//!
//! Each submodule implements exactly one step, so each is testable alone.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ media (fetch ▸ compress ▸ store) ──▶ render (normalize)
//! (page)    (tree walk)   (per image, concurrent)              (Markdown)
//! ```
//!
//! 1. [`fetch`]     — HTTP collaborator for the page and its images
//! 2. [`extract`]   — metadata + linearised body with placeholder tokens
//! 3. [`media`]     — resolve each image; failures drop only that image
//! 4. [`compress`]  — downscale + JPEG quality search; runs in `spawn_blocking`
//! 5. [`store`]     — write assets next to the document
//! 6. [`render`]    — header block + substituted, [`normalize`]d body

pub mod compress;
pub mod extract;
pub mod fetch;
pub mod media;
pub mod normalize;
pub mod render;
pub mod store;
