pub mod app;
pub mod conf;
pub mod error;
pub mod export;
pub mod render;
pub mod report;
pub mod storage;
pub mod trigger;
pub mod warehouse;

#[cfg(test)]
mod testing;
