pub mod discovery;
pub mod wire;
pub(crate) mod xml;
