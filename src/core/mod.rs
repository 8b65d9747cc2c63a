pub mod archive;
pub mod audio;
pub mod cleanup;
pub mod locator;
pub mod normalize;
pub mod separator;
pub mod stems;
