//! Batch rewriting of MATSim population files: reassign a selected share of
//! vehicle-owning persons from one mode category (e.g. "car") to another
//! (e.g. "microcar"), keeping the person-level vehicle mapping and all plan
//! references consistent.

pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod rewriter;
pub mod selection;
