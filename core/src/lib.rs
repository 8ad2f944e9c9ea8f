pub mod cache;
pub mod chef;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod retrieval;
pub mod retry;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
