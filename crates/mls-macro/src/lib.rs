//! `mls-macro` — first-order macroscopic traffic flow.
//!
//! Two discretizations of the same conservation law `∂ρ/∂t + ∂q/∂x = 0`:
//!
//! - [`LwrGrid`] — density per cell, Greenshields fundamental diagram,
//!   Godunov (demand/supply) update.
//! - [`CtmGrid`] — vehicles per cell, triangular fundamental diagram,
//!   sending/receiving-flow update.
//!
//! Both are periodic within their lane: the core leaves cross-lane coupling
//! at junctions to external collaborators.

pub mod ctm;
pub mod lwr;


pub use ctm::CtmGrid;
pub use lwr::LwrGrid;
