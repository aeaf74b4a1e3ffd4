pub mod automation;
pub mod chrome;
pub mod driver;
#[cfg(test)]
pub(crate) mod fake;
