// Stashed contexts
// One module per execution surface. Contexts hold no state of their own
// beyond UI status; they sequence calls into the shared managers and
// tolerate each other's interleavings because every write is idempotent.

pub mod background;
pub mod content_script;
pub mod popup;
