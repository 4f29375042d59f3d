pub mod clean;
pub mod extras;
pub mod review;
pub mod study;
pub mod sync;
