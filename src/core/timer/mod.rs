mod pause_timer;

pub use pause_timer::*;
