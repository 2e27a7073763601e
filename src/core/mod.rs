mod dispatcher;
mod event;
mod feedback;
mod phase;
mod reservation;
mod supervisor;
mod timer;

#[doc(hidden)]
pub use dispatcher::*;
#[doc(hidden)]
pub use event::*;
#[doc(hidden)]
pub use feedback::*;
#[doc(hidden)]
pub use phase::*;
#[doc(hidden)]
pub use reservation::*;
#[doc(hidden)]
pub use supervisor::*;
#[doc(hidden)]
pub use timer::*;
