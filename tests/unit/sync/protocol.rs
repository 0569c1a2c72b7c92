use super::*;

fn h(i: u64) -> HandleId {
    HandleId::from_bits(i)
}

#[test]
fn alpha_only_message_carries_exactly_one_field() {
    let mut buf = WireBuffer::new();
    let props = DisplayProps {
        alpha: 0.5,
        ..DisplayProps::default()
    };
    encode_display_object(&mut buf, h(1), DisplayDirty::ALPHA, &props, None);
    buf.finish();

    let mut expected = vec![MessageTag::UpdateDisplayObject as u8];
    expected.extend_from_slice(&DisplayDirty::ALPHA.bits().to_le_bytes());
    expected.extend_from_slice(&0.5f32.to_le_bytes());
    expected.push(MessageTag::EndOfFile as u8);
    assert_eq!(buf.as_bytes(), expected.as_slice());
    assert_eq!(buf.handles(), &[h(1)]);
}

#[test]
fn matrix_encoding_picks_cheapest_exact_form() {
    assert_eq!(
        MatrixEncoding::classify(Affine::translate((3.0, 4.0))),
        MatrixEncoding::Translation
    );
    assert_eq!(
        MatrixEncoding::classify(Affine::scale(2.0).then_translate(Vec2::new(1.0, 0.0))),
        MatrixEncoding::UniformScale
    );
    assert_eq!(
        MatrixEncoding::classify(Affine::scale_non_uniform(2.0, 3.0)),
        MatrixEncoding::Scale
    );
    assert_eq!(
        MatrixEncoding::classify(Affine::rotate(0.5)),
        MatrixEncoding::Affine
    );
}

#[test]
fn translation_matrix_costs_two_floats() {
    let mut buf = WireBuffer::new();
    Affine::translate((7.0, -2.0)).write(&mut buf);
    assert_eq!(buf.len(), 1 + 2 * 4);

    let back = Affine::read(&mut buf.reader()).unwrap();
    assert_eq!(back, Affine::translate((7.0, -2.0)));
}

#[test]
fn display_object_fields_decode_in_bit_order() {
    let mut buf = WireBuffer::new();
    let props = DisplayProps {
        matrix: Affine::scale_non_uniform(2.0, 0.5),
        visible: false,
        filters: vec![Filter::Blur {
            blur_x: 4.0,
            blur_y: 2.0,
        }],
        mask_rect: Some(Rect::new(1.0, 2.0, 11.0, 22.0)),
        ..DisplayProps::default()
    };
    let dirty = DisplayDirty::MATRIX
        | DisplayDirty::FILTERS
        | DisplayDirty::VISIBLE
        | DisplayDirty::MASK
        | DisplayDirty::MASK_RECT;
    encode_display_object(&mut buf, h(4), dirty, &props, Some(h(9)));
    buf.finish();

    let msgs = decode_all(&buf).unwrap();
    assert_eq!(msgs.len(), 1);
    let Message::UpdateDisplayObject { target, update } = &msgs[0] else {
        panic!("unexpected message {:?}", msgs[0]);
    };
    assert_eq!(*target, h(4));
    assert_eq!(update.dirty, dirty);
    assert_eq!(update.mask, Some(h(9)));
    assert_eq!(update.props.matrix, props.matrix);
    assert_eq!(update.props.filters, props.filters);
    assert!(!update.props.visible);
    assert_eq!(update.props.mask_rect, props.mask_rect);
}

#[test]
fn text_field_strings_go_through_the_table() {
    let mut buf = WireBuffer::new();
    let props = TextFieldProps {
        text: "Arial".to_owned(),
        ..TextFieldProps::default()
    };
    encode_text_field(
        &mut buf,
        h(2),
        TextFieldDirty::TEXT | TextFieldDirty::FONT_FAMILY | TextFieldDirty::INPUT_TYPE,
        &props,
    );
    buf.finish();
    // Text and family are equal, so one table entry.
    assert_eq!(buf.strings().len(), 1);

    let msgs = decode_all(&buf).unwrap();
    let Message::UpdateTextField { dirty, props: got, .. } = &msgs[0] else {
        panic!("unexpected message {:?}", msgs[0]);
    };
    assert!(dirty.contains(TextFieldDirty::INPUT_TYPE));
    assert_eq!(got.text, "Arial");
    assert_eq!(got.font_family, "Arial");
}

#[test]
fn children_and_graphics_use_counts() {
    let mut buf = WireBuffer::new();
    encode_children(&mut buf, h(0), &[h(1), h(2)]);
    encode_graphics(
        &mut buf,
        h(1),
        &[
            GraphicsCommand::BeginFill {
                color: 0xff0000,
                alpha: 1.0,
            },
            GraphicsCommand::DrawCircle {
                x: 5.0,
                y: 5.0,
                r: 3.0,
            },
            GraphicsCommand::EndFill,
        ],
    );
    buf.finish();

    let msgs = decode_all(&buf).unwrap();
    assert_eq!(
        msgs[0],
        Message::UpdateChildren {
            target: h(0),
            children: vec![h(1), h(2)],
        }
    );
    let Message::UpdateGraphics { commands, .. } = &msgs[1] else {
        panic!("unexpected message {:?}", msgs[1]);
    };
    assert_eq!(commands.len(), 3);
}

#[test]
fn reader_stops_at_end_of_file() {
    let mut buf = WireBuffer::new();
    encode_children(&mut buf, h(0), &[]);
    buf.write_u8(MessageTag::EndOfFile as u8);
    // Garbage after the first terminator is never looked at.
    buf.write_u8(0xEE);
    let msgs: Vec<_> = MessageReader::new(&buf).collect();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].is_ok());
}

#[test]
fn unknown_tag_is_a_protocol_error() {
    let mut buf = WireBuffer::new();
    buf.write_u8(99);
    let mut it = MessageReader::new(&buf);
    assert!(matches!(it.next(), Some(Err(StageError::Protocol(_)))));
    assert!(it.next().is_none());
}

#[test]
fn truncated_message_is_a_protocol_error() {
    let mut buf = WireBuffer::new();
    buf.write_handle(h(1));
    buf.write_u8(MessageTag::UpdateDisplayObject as u8);
    buf.write_u32(DisplayDirty::ALPHA.bits());
    assert!(matches!(decode_all(&buf), Err(StageError::Protocol(_))));
}

#[test]
fn missing_terminator_is_a_protocol_error() {
    let mut buf = WireBuffer::new();
    encode_children(&mut buf, h(0), &[h(3)]);
    let err = decode_all(&buf).unwrap_err();
    assert!(err.to_string().contains("end-of-file"));
}

#[test]
fn unknown_bits_are_rejected() {
    let mut buf = WireBuffer::new();
    buf.write_handle(h(1));
    buf.write_u8(MessageTag::UpdateStage as u8);
    buf.write_u32(1 << 7);
    buf.finish();
    assert!(matches!(decode_all(&buf), Err(StageError::Protocol(_))));
}
