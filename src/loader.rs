//! The asset steps. Each one turns the sources matched by its configured
//! patterns into artifacts under the output tree, delegating the actual
//! transformation to a library or an external tool.
//!
//! All of them are blocking and meant to run on a blocking thread.

pub mod fonts;
pub mod images;
pub mod scripts;
pub mod styles;
pub mod views;
