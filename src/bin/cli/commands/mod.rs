pub mod cards;
pub mod decks;
pub mod serve;
pub mod stats;
pub mod study;
