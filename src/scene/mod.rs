/// Application-side display tree.
pub mod graph;
/// Attribute and content types shared with the backend.
pub mod props;
