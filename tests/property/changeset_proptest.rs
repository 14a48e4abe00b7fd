//! Property-based tests for the changeset algebra

use proptest::prelude::*;
use xfpad::shared::apool::{Attribute, AttributePool};
use xfpad::shared::atext::{apply_to_atext, AText};
use xfpad::shared::changeset::{
    apply_to_text, check_rep, compose, deserialize_ops, follow, identity, inverse, make_splice, new_len, pack,
    unpack, AttributeMap, Builder,
};

/// A splice over `text`: start, chars removed, inserted text. Never
/// touches the final newline.
#[derive(Debug, Clone)]
struct Splice {
    start: usize,
    ndel: usize,
    ins: String,
}

fn doc() -> impl Strategy<Value = String> {
    "[ab\n]{0,12}".prop_map(|body| format!("{}\n", body))
}

fn splice_for(len: usize) -> impl Strategy<Value = Splice> {
    (0..len).prop_flat_map(move |start| {
        (Just(start), 0..len - start, "[xy\n]{0,4}").prop_map(|(start, ndel, ins)| Splice { start, ndel, ins })
    })
}

fn doc_with_splice() -> impl Strategy<Value = (String, Splice)> {
    doc().prop_flat_map(|text| {
        let len = text.chars().count();
        (Just(text), splice_for(len))
    })
}

fn doc_with_two_splices() -> impl Strategy<Value = (String, Splice, Splice)> {
    doc().prop_flat_map(|text| {
        let len = text.chars().count();
        (Just(text), splice_for(len), splice_for(len))
    })
}

fn splice_cs(text: &str, s: &Splice) -> String {
    make_splice(text, s.start, s.ndel, &s.ins, "")
}

fn expected(text: &str, s: &Splice) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out: String = chars[..s.start].iter().collect();
    out.push_str(&s.ins);
    out.extend(&chars[s.start + s.ndel..]);
    out
}

/// Pool shared by the attributed strategies: `*0` bold, `*1` italic,
/// `*2` and `*3` clear them, `*4` an author.
fn base_pool() -> AttributePool {
    let mut pool = AttributePool::new();
    for (key, value) in [("bold", "true"), ("italic", "true"), ("bold", ""), ("italic", ""), ("author", "a.x")] {
        pool.put_attrib(Attribute::new(key, value));
    }
    pool
}

const INSERT_ATTRIBS: [&str; 5] = ["", "*0", "*1", "*0*1", "*4"];
const FORMAT_ATTRIBS: [&str; 5] = ["*0", "*1", "*2", "*3", "*2*3"];

/// Text built from attributed runs inserted into an empty pad.
fn attributed_doc() -> impl Strategy<Value = AText> {
    prop::collection::vec(("[ab\n]{1,4}", 0..INSERT_ATTRIBS.len()), 0..4).prop_map(|runs| {
        let mut builder = Builder::new(1);
        for (text, attr) in &runs {
            builder.insert(text, INSERT_ATTRIBS[*attr]);
        }
        let cs = builder.to_string();
        apply_to_atext(&cs, &AText::new("\n"), &mut base_pool()).unwrap()
    })
}

/// An attributed insert or a formatting keep. Never touches the final newline.
#[derive(Debug, Clone)]
enum Edit {
    Splice { start: usize, ndel: usize, ins: String, attr: usize },
    Format { start: usize, len: usize, attr: usize },
}

fn edit_for(len: usize) -> impl Strategy<Value = Edit> {
    let splice = (0..len).prop_flat_map(move |start| {
        (Just(start), 0..len - start, "[xy\n]{0,4}", 0..INSERT_ATTRIBS.len())
            .prop_map(|(start, ndel, ins, attr)| Edit::Splice { start, ndel, ins, attr })
    });
    let format = (0..len).prop_flat_map(move |start| {
        (Just(start), 0..len - start, 0..FORMAT_ATTRIBS.len())
            .prop_map(|(start, len, attr)| Edit::Format { start, len, attr })
    });
    prop_oneof![splice, format]
}

fn attributed_doc_with_edit() -> impl Strategy<Value = (AText, Edit)> {
    attributed_doc().prop_flat_map(|atext| {
        let len = atext.text.chars().count();
        (Just(atext), edit_for(len))
    })
}

fn attributed_doc_with_two_edits() -> impl Strategy<Value = (AText, Edit, Edit)> {
    attributed_doc().prop_flat_map(|atext| {
        let len = atext.text.chars().count();
        (Just(atext), edit_for(len), edit_for(len))
    })
}

fn edit_cs(text: &str, edit: &Edit) -> String {
    match edit {
        Edit::Splice { start, ndel, ins, attr } => make_splice(text, *start, *ndel, ins, INSERT_ATTRIBS[*attr]),
        Edit::Format { start, len, attr } => {
            let chars: Vec<char> = text.chars().collect();
            let prefix: String = chars[..*start].iter().collect();
            let range: String = chars[*start..start + len].iter().collect();
            Builder::new(chars.len())
                .keep_text(&prefix, "")
                .keep_text(&range, FORMAT_ATTRIBS[*attr])
                .to_string()
        }
    }
}

/// Each character with its attributes, independent of how runs are encoded.
fn attributed_chars(atext: &AText, pool: &AttributePool) -> Vec<(char, Vec<(String, String)>)> {
    let mut chars = atext.text.chars();
    let mut out = Vec::new();
    for op in deserialize_ops(&atext.attribs).unwrap() {
        let map = AttributeMap::from_attribs_string(&op.attribs, pool).unwrap();
        let attribs: Vec<(String, String)> = map.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        for _ in 0..op.chars {
            out.push((chars.next().unwrap(), attribs.clone()));
        }
    }
    assert!(chars.next().is_none(), "attribution shorter than text");
    out
}

proptest! {
    #[test]
    fn test_splice_applies((text, s) in doc_with_splice()) {
        let cs = splice_cs(&text, &s);
        prop_assert!(check_rep(&cs).is_ok());
        prop_assert_eq!(apply_to_text(&cs, &text).unwrap(), expected(&text, &s));
    }

    #[test]
    fn test_unpack_pack_round_trip((text, s) in doc_with_splice()) {
        let cs = splice_cs(&text, &s);
        let parts = unpack(&cs).unwrap();
        prop_assert_eq!(pack(parts.old_len, parts.new_len, &parts.ops, &parts.char_bank), cs);
    }

    #[test]
    fn test_compose_matches_sequential_application((text, a, b) in doc_with_two_splices()) {
        let mut pool = AttributePool::new();
        let cs1 = splice_cs(&text, &a);
        let mid = apply_to_text(&cs1, &text).unwrap();
        let mid_len = mid.chars().count();
        let b = Splice {
            start: b.start.min(mid_len - 1),
            ndel: b.ndel.min(mid_len - 1 - b.start.min(mid_len - 1)),
            ins: b.ins,
        };
        let cs2 = splice_cs(&mid, &b);
        let composed = compose(&cs1, &cs2, &mut pool).unwrap();
        prop_assert_eq!(apply_to_text(&composed, &text).unwrap(), apply_to_text(&cs2, &mid).unwrap());
    }

    #[test]
    fn test_compose_with_identity((text, s) in doc_with_splice()) {
        let mut pool = AttributePool::new();
        let cs = splice_cs(&text, &s);
        let composed = compose(&cs, &identity(new_len(&cs).unwrap()), &mut pool).unwrap();
        prop_assert_eq!(apply_to_text(&composed, &text).unwrap(), apply_to_text(&cs, &text).unwrap());
    }

    #[test]
    fn test_inverse_restores_text((text, s) in doc_with_splice()) {
        let mut pool = AttributePool::new();
        let atext = AText::new(text.clone());
        let cs = splice_cs(&text, &s);
        let after = apply_to_atext(&cs, &atext, &mut pool).unwrap();
        let undo = inverse(&cs, &atext, &mut pool).unwrap();
        prop_assert_eq!(apply_to_atext(&undo, &after, &mut pool).unwrap().text, atext.text);
    }

    #[test]
    fn test_follow_diamond((text, a, b) in doc_with_two_splices()) {
        let mut pool = AttributePool::new();
        let cs_a = splice_cs(&text, &a);
        let cs_b = splice_cs(&text, &b);
        let b_prime = follow(&cs_a, &cs_b, false, &pool).unwrap();
        let a_prime = follow(&cs_b, &cs_a, true, &pool).unwrap();
        let left = compose(&cs_a, &b_prime, &mut pool).unwrap();
        let right = compose(&cs_b, &a_prime, &mut pool).unwrap();
        prop_assert_eq!(apply_to_text(&left, &text).unwrap(), apply_to_text(&right, &text).unwrap());
    }

    #[test]
    fn test_inverse_restores_attributed_text((atext, edit) in attributed_doc_with_edit()) {
        let mut pool = base_pool();
        let cs = edit_cs(&atext.text, &edit);
        let after = apply_to_atext(&cs, &atext, &mut pool).unwrap();
        let undo = inverse(&cs, &atext, &mut pool).unwrap();
        let restored = apply_to_atext(&undo, &after, &mut pool).unwrap();
        prop_assert_eq!(&restored.text, &atext.text);
        prop_assert_eq!(attributed_chars(&restored, &pool), attributed_chars(&atext, &pool));
    }

    #[test]
    fn test_follow_diamond_with_attributes((atext, a, b) in attributed_doc_with_two_edits()) {
        let mut pool = base_pool();
        let cs_a = edit_cs(&atext.text, &a);
        let cs_b = edit_cs(&atext.text, &b);
        let b_prime = follow(&cs_a, &cs_b, false, &pool).unwrap();
        let a_prime = follow(&cs_b, &cs_a, true, &pool).unwrap();

        let via_a = apply_to_atext(&cs_a, &atext, &mut pool).unwrap();
        let left = apply_to_atext(&b_prime, &via_a, &mut pool).unwrap();
        let via_b = apply_to_atext(&cs_b, &atext, &mut pool).unwrap();
        let right = apply_to_atext(&a_prime, &via_b, &mut pool).unwrap();
        prop_assert_eq!(&left.text, &right.text);
        prop_assert_eq!(attributed_chars(&left, &pool), attributed_chars(&right, &pool));

        // Composing first lands on the same document.
        let composed = compose(&cs_a, &b_prime, &mut pool).unwrap();
        let direct = apply_to_atext(&composed, &atext, &mut pool).unwrap();
        prop_assert_eq!(attributed_chars(&direct, &pool), attributed_chars(&left, &pool));
    }
}
