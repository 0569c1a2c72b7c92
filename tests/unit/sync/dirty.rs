use super::*;

fn node(i: u64) -> NodeId {
    NodeId::from_bits(i)
}

#[test]
fn repeated_marks_drain_like_a_single_mark() {
    let mut once = DirtyTracker::new();
    once.mark_dirty(node(2), DisplayDirty::ALPHA);

    let mut many = DirtyTracker::new();
    for _ in 0..5 {
        many.mark_dirty(node(2), DisplayDirty::ALPHA);
    }

    assert_eq!(once.drain(node(2)), many.drain(node(2)));
}

#[test]
fn drain_clears_every_group() {
    let mut t = DirtyTracker::new();
    let n = node(0);
    t.mark_dirty(n, DisplayDirty::MATRIX | DisplayDirty::MASK_RECT);
    t.mark_dirty(n, TextFieldDirty::SIZE);
    t.mark_dirty(n, DirtyMask::CHILDREN);

    let first = t.drain(n);
    assert_eq!(first.display, DisplayDirty::MATRIX | DisplayDirty::MASK_RECT);
    assert_eq!(first.text_field, TextFieldDirty::SIZE);
    assert!(first.children);

    assert!(t.drain(n).is_empty());
    assert_eq!(t.pending_count(), 0);
}

#[test]
fn draining_an_untracked_node_is_empty() {
    let mut t = DirtyTracker::new();
    assert!(t.drain(node(40)).is_empty());
    assert!(!t.needs_visit(node(40)));
}

#[test]
fn bit_groups_have_the_wire_widths() {
    assert_eq!(DisplayDirty::all().bits().count_ones(), 9);
    assert_eq!(StageDirty::all().bits().count_ones(), 3);
    assert_eq!(BitmapDirty::all().bits().count_ones(), 4);
    assert_eq!(TextFieldDirty::all().bits().count_ones(), 22);
    assert_eq!(DisplayDirty::MASK_RECT.bits(), 1 << 8);
    assert_eq!(TextFieldDirty::SIZE.bits(), 1 << 21);
}

#[test]
fn full_mask_only_populates_the_kind_group() {
    let m = DirtyMask::full(NodeType::Bitmap);
    assert_eq!(m.display, DisplayDirty::all());
    assert_eq!(m.bitmap, BitmapDirty::all());
    assert!(m.text_field.is_empty());
    assert!(m.stage.is_empty());
    assert!(m.children);
}

#[test]
fn descendant_flag_survives_drain() {
    let mut t = DirtyTracker::new();
    let n = node(1);
    assert!(!t.mark_descendant(n));
    assert!(t.mark_descendant(n));
    assert!(t.drain(n).is_empty());
    assert!(t.needs_visit(n));
    assert!(t.take_descendant(n));
    assert!(!t.needs_visit(n));
}
