mod player;
mod process;
mod sequencer;

pub(crate) use player::*;
pub(crate) use sequencer::*;
