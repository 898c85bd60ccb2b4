//! Core XML scanning primitives
//!
//! This module contains the building blocks the fragment scan runs on:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - UnifiedScanner: resumable, ScanHandler-based scanner over one window
//! - Entities: entity decoding with Cow (zero-copy when possible) and escaping
//! - Encoding: BOM handling and UTF-16 conversion to UTF-8
//! - Recovery: strict or recovering treatment of malformed markup

pub mod encoding;
pub mod entities;
pub mod recovery;
pub mod scanner;
pub mod unified_scanner;
