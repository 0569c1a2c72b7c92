use super::*;
use crate::sync::dirty::{BitmapDirty, StageDirty, TextFieldDirty};

fn drained(scene: &mut SceneGraph, node: NodeId) -> DirtyMask {
    scene.dirty_mut().drain(node)
}

#[test]
fn new_nodes_start_fully_dirty() {
    let mut scene = SceneGraph::new();
    let t = scene.create_node(NodeType::TextField);
    let mask = drained(&mut scene, t);
    assert_eq!(mask, DirtyMask::full(NodeType::TextField));
    assert_eq!(mask.text_field, TextFieldDirty::all());
}

#[test]
fn setters_mark_only_on_change() {
    let mut scene = SceneGraph::new();
    let n = scene.create_node(NodeType::Node);
    drained(&mut scene, n);

    scene.set_alpha(n, 1.0);
    assert!(scene.dirty().peek(n).is_empty());

    scene.set_alpha(n, 0.5);
    scene.set_visible(n, false);
    let mask = drained(&mut scene, n);
    assert_eq!(mask.display, DisplayDirty::ALPHA | DisplayDirty::VISIBLE);
    assert_eq!(scene.get(n).unwrap().props().alpha, 0.5);
}

#[test]
fn marks_flag_every_ancestor() {
    let mut scene = SceneGraph::new();
    let root = scene.create_node(NodeType::Node);
    let mid = scene.create_node(NodeType::Node);
    let leaf = scene.create_node(NodeType::Graphics);
    scene.add_child(root, mid).unwrap();
    scene.add_child(mid, leaf).unwrap();
    for n in [root, mid, leaf] {
        drained(&mut scene, n);
        scene.dirty_mut().take_descendant(n);
    }

    scene.push_graphics(leaf, GraphicsCommand::EndFill);
    assert!(scene.dirty().needs_visit(root));
    assert!(scene.dirty().needs_visit(mid));
    assert_eq!(
        drained(&mut scene, leaf).graphics,
        GraphicsDirty::COMMANDS
    );
}

#[test]
fn reparenting_marks_both_parents() {
    let mut scene = SceneGraph::new();
    let a = scene.create_node(NodeType::Node);
    let b = scene.create_node(NodeType::Node);
    let c = scene.create_node(NodeType::Node);
    scene.add_child(a, c).unwrap();
    for n in [a, b, c] {
        drained(&mut scene, n);
    }

    scene.add_child(b, c).unwrap();
    assert!(drained(&mut scene, a).children);
    assert!(drained(&mut scene, b).children);
    assert!(scene.children(a).is_empty());
    assert_eq!(scene.children(b), &[c]);
    assert_eq!(scene.get(c).unwrap().parent(), Some(b));
}

#[test]
fn cycles_are_rejected() {
    let mut scene = SceneGraph::new();
    let a = scene.create_node(NodeType::Node);
    let b = scene.create_node(NodeType::Node);
    scene.add_child(a, b).unwrap();
    assert!(scene.add_child(b, a).is_err());
    assert!(scene.add_child(a, a).is_err());
}

#[test]
fn child_index_moves_within_parent() {
    let mut scene = SceneGraph::new();
    let p = scene.create_node(NodeType::Node);
    let x = scene.create_node(NodeType::Node);
    let y = scene.create_node(NodeType::Node);
    let z = scene.create_node(NodeType::Node);
    for c in [x, y, z] {
        scene.add_child(p, c).unwrap();
    }
    scene.set_child_index(p, z, 0).unwrap();
    assert_eq!(scene.children(p), &[z, x, y]);
    scene.add_child_at(p, x, 100).unwrap();
    assert_eq!(scene.children(p), &[z, y, x]);
}

#[test]
fn destroy_orphans_children_and_ignores_later_setters() {
    let mut scene = SceneGraph::new();
    let p = scene.create_node(NodeType::Node);
    let c = scene.create_node(NodeType::Node);
    scene.add_child(p, c).unwrap();

    assert!(scene.destroy(p));
    assert!(!scene.destroy(p));
    assert_eq!(scene.get(c).unwrap().parent(), None);

    scene.set_alpha(p, 0.1);
    assert!(scene.dirty().peek(p).is_empty());
    assert!(scene.add_child(p, c).is_err());
}

#[test]
fn destroying_a_mask_clears_references() {
    let mut scene = SceneGraph::new();
    let n = scene.create_node(NodeType::Node);
    let m = scene.create_node(NodeType::Graphics);
    scene.set_mask(n, Some(m));
    drained(&mut scene, n);

    scene.destroy(m);
    assert_eq!(scene.get(n).unwrap().mask(), None);
    assert_eq!(drained(&mut scene, n).display, DisplayDirty::MASK);
}

#[test]
fn content_edits_diff_against_previous_value() {
    let mut scene = SceneGraph::new();
    let s = scene.create_stage(StageDisplayRule::fixed(100, 100));
    let b = scene.create_node(NodeType::Bitmap);
    drained(&mut scene, s);
    drained(&mut scene, b);

    scene.set_display_rule(s, StageDisplayRule::fixed(200, 100));
    assert_eq!(
        drained(&mut scene, s).stage,
        StageDirty::CONTENT_SIZE | StageDirty::DISPLAY_RECT
    );

    scene.update_bitmap(b, |p| p.fill_mode = crate::scene::props::FillMode::Repeat);
    assert_eq!(drained(&mut scene, b).bitmap, BitmapDirty::FILL_MODE);

    // Wrong kind: ignored.
    scene.update_text_field(b, |t| t.text = "x".to_owned());
    assert!(scene.dirty().peek(b).is_empty());
}

#[test]
fn detached_mask_edits_flag_the_masked_node() {
    let mut scene = SceneGraph::new();
    let root = scene.create_node(NodeType::Node);
    let n = scene.create_node(NodeType::Node);
    let m = scene.create_node(NodeType::Graphics);
    scene.add_child(root, n).unwrap();
    scene.set_mask(n, Some(m));
    for id in [root, n, m] {
        drained(&mut scene, id);
        scene.dirty_mut().take_descendant(id);
    }

    scene.push_graphics(m, GraphicsCommand::DrawRect { x: 0.0, y: 0.0, w: 4.0, h: 4.0 });
    assert!(scene.dirty().needs_visit(n));
    assert!(scene.dirty().needs_visit(root));
}
