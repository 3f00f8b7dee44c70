//! Study sessions: card navigation, answer checking, timed reveal and
//! auto-advance

pub mod driver;
pub mod engine;
pub mod state;
pub mod timers;
pub mod view;

pub use driver::{ReviewSink, SessionClosed, SessionDriver, SessionHandle};
pub use engine::{Effect, SessionCommand, SessionEngine};
pub use state::{CardPhase, ChoiceOrder, Direction, SessionState, TimerConfig};
pub use timers::{TimerHandle, TimerKind, TimerSlots};
pub use view::{Banner, CardKind, CardView, ChoiceView, SessionView};
