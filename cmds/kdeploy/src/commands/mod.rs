pub mod render;

pub mod util;
