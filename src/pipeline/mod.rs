//! Recognition stages used by the image converter.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ encode ──▶ llm ──▶ postprocess
//! (preview) (PNG/base64) (VLM)  (cleanup)
//! ```
//!
//! 1. [`encode`] — decode the preview, cap its size, wrap it as base64 PNG
//! 2. [`llm`]    — drive the VLM call with retry/backoff; the only stage with
//!    network I/O
//! 3. [`postprocess`] — flatten and scrub the text so it fits in one OCR section

pub mod encode;
pub mod llm;
pub mod postprocess;
