use super::*;
use crate::scene::props::{BitmapProps, DisplayProps};
use crate::sync::dirty::BitmapDirty;
use crate::sync::protocol::DisplayObjectUpdate;

fn owner(n: u64) -> NodeId {
    NodeId::from_bits(n)
}

fn alpha(target: HandleId, alpha: f32) -> Message {
    Message::UpdateDisplayObject {
        target,
        update: DisplayObjectUpdate {
            dirty: DisplayDirty::ALPHA,
            props: DisplayProps {
                alpha,
                ..DisplayProps::default()
            },
            mask: None,
        },
    }
}

fn clean_all(reg: &mut NodeRegistry, handles: &[HandleId]) {
    for h in handles {
        reg.get_mut(*h).unwrap().dirty = false;
    }
}

#[test]
fn same_kind_returns_same_handle() {
    let mut reg = NodeRegistry::new();
    let a = reg.make_node(owner(1), NodeType::Bitmap);
    let b = reg.make_node(owner(1), NodeType::Bitmap);
    assert_eq!(a, b);
    assert_eq!(reg.len(), 1);
}

#[test]
fn kind_change_destroys_previous_handle() {
    let mut reg = NodeRegistry::new();
    let a = reg.make_node(owner(1), NodeType::Bitmap);
    let b = reg.make_node(owner(1), NodeType::Graphics);
    assert_ne!(a, b);
    assert!(!reg.contains(a));
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.handle_for(owner(1)), Some(b));
    assert_eq!(reg.get(b).unwrap().node_type(), NodeType::Graphics);
}

#[test]
fn handles_are_unique_across_owners() {
    let mut reg = NodeRegistry::new();
    let hs: Vec<_> = (0..5)
        .map(|i| reg.make_node(owner(i), NodeType::Node))
        .collect();
    for (i, a) in hs.iter().enumerate() {
        for b in &hs[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn stale_handles_are_skipped() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let a = reg.make_node(owner(1), NodeType::Node);
    reg.destroy(a);
    // Slot reused by another owner.
    let b = reg.make_node(owner(2), NodeType::Node);
    assert_eq!(a.index(), b.index());
    reg.apply(&alpha(a, 0.25), &mut textures);
    assert_eq!(reg.get(b).unwrap().props().alpha, 1.0);
    assert!(reg.destroy(a).is_none());
}

#[test]
fn children_update_sets_parents_and_moves_nodes() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let p1 = reg.make_node(owner(1), NodeType::Node);
    let p2 = reg.make_node(owner(2), NodeType::Node);
    let c = reg.make_node(owner(3), NodeType::Node);

    reg.apply(
        &Message::UpdateChildren {
            target: p1,
            children: vec![c],
        },
        &mut textures,
    );
    assert_eq!(reg.get(c).unwrap().parent(), Some(p1));

    reg.apply(
        &Message::UpdateChildren {
            target: p2,
            children: vec![c, c, p2],
        },
        &mut textures,
    );
    assert_eq!(reg.get(c).unwrap().parent(), Some(p2));
    assert!(reg.get(p1).unwrap().children().is_empty());
    assert_eq!(reg.get(p2).unwrap().children(), &[c]);
}

#[test]
fn invalidation_walks_to_the_root() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let root = reg.make_node(owner(1), NodeType::Stage);
    let mid = reg.make_node(owner(2), NodeType::Node);
    let leaf = reg.make_node(owner(3), NodeType::Node);
    for (p, c) in [(root, mid), (mid, leaf)] {
        reg.apply(
            &Message::UpdateChildren {
                target: p,
                children: vec![c],
            },
            &mut textures,
        );
    }
    clean_all(&mut reg, &[root, mid, leaf]);

    reg.apply(&alpha(leaf, 0.5), &mut textures);
    // Composite-only change: the leaf's own rendering is still valid.
    assert!(!reg.get(leaf).unwrap().is_dirty());
    assert!(reg.get(mid).unwrap().is_dirty());
    assert!(reg.get(root).unwrap().is_dirty());
}

#[test]
fn mask_changes_reach_the_masked_node() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let node = reg.make_node(owner(1), NodeType::Node);
    let mask = reg.make_node(owner(2), NodeType::Graphics);
    reg.apply(
        &Message::UpdateDisplayObject {
            target: node,
            update: DisplayObjectUpdate {
                dirty: DisplayDirty::MASK,
                props: DisplayProps::default(),
                mask: Some(mask),
            },
        },
        &mut textures,
    );
    assert_eq!(reg.get(node).unwrap().mask(), Some(mask));
    clean_all(&mut reg, &[node, mask]);

    reg.apply(
        &Message::UpdateGraphics {
            target: mask,
            commands: Vec::new(),
        },
        &mut textures,
    );
    assert!(reg.get(node).unwrap().is_dirty());

    reg.destroy(mask);
    assert_eq!(reg.get(node).unwrap().mask(), None);
}

#[test]
fn bitmap_texture_key_is_linked() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let bmp = reg.make_node(owner(1), NodeType::Bitmap);
    let set = |key: Option<&str>| Message::UpdateBitmap {
        target: bmp,
        dirty: BitmapDirty::BITMAP_DATA,
        props: BitmapProps {
            texture: key.map(str::to_owned),
            ..BitmapProps::default()
        },
    };
    reg.apply(&set(Some("a")), &mut textures);
    assert_eq!(textures.linked("a"), &[bmp]);
    reg.apply(&set(Some("b")), &mut textures);
    assert!(textures.linked("a").is_empty());
    assert_eq!(textures.linked("b"), &[bmp]);
    reg.apply(&set(None), &mut textures);
    assert!(textures.linked("b").is_empty());
}

#[test]
fn mismatched_kind_message_is_ignored() {
    let mut reg = NodeRegistry::new();
    let mut textures = TextureStore::new();
    let n = reg.make_node(owner(1), NodeType::Node);
    reg.apply(
        &Message::UpdateGraphics {
            target: n,
            commands: Vec::new(),
        },
        &mut textures,
    );
    assert_eq!(reg.get(n).unwrap().payload(), &NodeContent::Node);
}
