//! Workspace archive handling for the codebox sandbox.
//!
//! Two concerns live here: deciding which workspace paths stay out of
//! artifact archives ([`is_excluded`]) and moving whole workspaces
//! through gzip-compressed tar bytes ([`extract`], [`create`]) without
//! ever letting an archive write outside its destination.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod exclude;
mod tar;

pub use exclude::is_excluded;
pub use tar::{create, extract};
