//! Changeset algebra against literal inputs and outputs

use pretty_assertions::assert_eq;
use xfpad::shared::apool::{Attribute, AttributePool};
use xfpad::shared::atext::{apply_to_atext, make_atext};
use xfpad::shared::changeset::{
    apply_to_text, compose, follow, identity, inverse, make_splice, ops_from_text, unpack, OpCode,
};

use crate::assert_ok;

#[test]
fn test_splice_at_end() {
    let cs = make_splice("123\n", 3, 0, "456", "");
    assert_eq!(assert_ok!(apply_to_text(&cs, "123\n")), "123456\n");
}

#[test]
fn test_splice_across_newline() {
    let text = "a\nb\nc\n";
    let cs = make_splice(text, 5, 0, "def", "");
    assert_eq!(cs, "Z:6>3|2=4=1+3$def");
    assert_eq!(assert_ok!(apply_to_text(&cs, text)), "a\nb\ncdef\n");
}

#[test]
fn test_ops_from_text_splits_lines() {
    let ops = ops_from_text(OpCode::Keep, &"a\nb\nc\n"[..5], "");
    assert_eq!(ops.len(), 2);
    assert_eq!((ops[0].opcode, ops[0].chars, ops[0].lines), (OpCode::Keep, 4, 2));
    assert_eq!((ops[1].opcode, ops[1].chars, ops[1].lines), (OpCode::Keep, 1, 0));
}

#[test]
fn test_unpack_header() {
    let cs = assert_ok!(unpack("Z:z>1|2=m=b*0|1+1$\n"));
    assert_eq!(cs.old_len, 35);
    assert_eq!(cs.new_len, 36);
    assert_eq!(cs.ops, "|2=m=b*0|1+1");
    assert_eq!(cs.char_bank, "\n");
}

#[test]
fn test_concurrent_inserts_converge() {
    let pool = AttributePool::new();
    let base = "hello\n";
    let a = make_splice(base, 5, 0, "!", "");
    let b = make_splice(base, 0, 0, "?", "");

    let b_over_a = assert_ok!(follow(&a, &b, false, &pool));
    let a_over_b = assert_ok!(follow(&b, &a, true, &pool));
    let left = assert_ok!(apply_to_text(&b_over_a, &assert_ok!(apply_to_text(&a, base))));
    let right = assert_ok!(apply_to_text(&a_over_b, &assert_ok!(apply_to_text(&b, base))));
    assert_eq!(left, "?hello!\n");
    assert_eq!(left, right);
}

#[test]
fn test_compose_with_identity() {
    let mut pool = AttributePool::new();
    let cs = make_splice("abc\n", 1, 1, "xyz", "");
    let composed = assert_ok!(compose(&cs, &identity(6), &mut pool));
    assert_eq!(
        assert_ok!(apply_to_text(&composed, "abc\n")),
        assert_ok!(apply_to_text(&cs, "abc\n"))
    );
}

#[test]
fn test_inverse_restores_attribution() {
    let mut pool = AttributePool::new();
    let bold = pool.put_attrib(Attribute::new("bold", "true"));
    let atext = make_atext("plain\n");
    let embolden = format!("Z:6>0*{}=5$", bold);
    let styled = assert_ok!(apply_to_atext(&embolden, &atext, &mut pool));
    assert_eq!(styled.attribs, format!("*{}+5|1+1", bold));

    let undo = assert_ok!(inverse(&embolden, &atext, &mut pool));
    let restored = assert_ok!(apply_to_atext(&undo, &styled, &mut pool));
    assert_eq!(restored, atext);
}
