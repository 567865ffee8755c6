//! Request pipeline, routing and the content store seam.

pub mod error;
pub mod highlight;
pub mod render;
pub mod repos;
pub mod router;
pub mod site;
pub mod suggest;

#[cfg(test)]
pub(crate) mod test_support;
