/// Per-node dirty bits.
pub mod dirty;
/// Message tags, matrix encodings and the typed message decoder.
pub mod protocol;
/// Scene-to-wire flush.
pub mod synchronizer;
/// Binary buffer with string and handle side tables.
pub mod wire;
