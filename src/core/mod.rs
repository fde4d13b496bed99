pub mod assembler;
pub mod audio;
pub mod batch;
pub mod dsp;
pub mod engine;
pub mod features;
pub mod layout;
pub mod pipeline;
pub mod rhythm;
pub mod single;
