//! Path normalization shared by the selector and the bundle watcher.

pub mod path;
