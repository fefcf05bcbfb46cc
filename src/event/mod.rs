pub mod bus;
pub mod special;

pub use bus::{
    Event, EventBus, EventPayload, LatestEventListener, Listener, Signal, SkillEventListener,
};
pub use special::{
    ElementalSeal, SpecialCtx, SpecialState, SpecialStateManager, SpecialUpdateSignal,
};
