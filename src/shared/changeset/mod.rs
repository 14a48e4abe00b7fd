//! Changeset Algebra
//!
//! A changeset describes one edit of an attributed text: which characters
//! to keep, insert and remove, and which attributes to set on the way. This
//! module parses, builds, applies, composes, inverts and rebases them.
//!
//! # Module Structure
//!
//! ```text
//! changeset/
//! ├── mod.rs         - Module exports and documentation
//! ├── op.rs          - Op type, base-36 numbers, op string parser
//! ├── text.rs        - Character-indexed string helpers
//! ├── attributes.rs  - Attribute strings and AttributeMap
//! ├── assembler.rs   - Op, merging and smart assemblers
//! ├── codec.rs       - Header packing, unpacking and check_rep
//! ├── builder.rs     - Changeset builder and ops_from_text
//! ├── apply.rs       - Apply to text/attribution, make_splice, zipping
//! ├── compose.rs     - compose, follow and pool translation
//! └── inverse.rs     - Inversion against an attributed text
//! ```
//!
//! # Example
//!
//! ```rust
//! use xfpad::shared::changeset::{apply_to_text, make_splice};
//!
//! let cs = make_splice("a\nb\nc\n", 5, 0, "def", "");
//! assert_eq!(cs, "Z:6>3|2=4=1+3$def");
//! assert_eq!(apply_to_text(&cs, "a\nb\nc\n").unwrap(), "a\nb\ncdef\n");
//! ```

pub mod apply;
pub mod assembler;
pub mod attributes;
pub mod builder;
pub mod codec;
pub mod compose;
pub mod inverse;
pub mod op;
pub mod text;

pub use apply::{
    apply_to_attribution, apply_to_text, apply_zip, join_attribution_lines, make_attribution, make_splice,
    slicer_zipper, split_attribution_lines, subattribution,
};
pub use assembler::{MergingOpAssembler, OpAssembler, SmartOpAssembler};
pub use attributes::{attribs_from_pairs, compose_attributes, follow_attributes, AttributeMap};
pub use builder::{ops_from_text, Builder};
pub use codec::{check_rep, identity, is_identity, new_len, old_len, pack, unpack, Changeset};
pub use compose::{compose, follow, move_ops_to_new_pool, prepare_for_wire};
pub use inverse::inverse;
pub use op::{deserialize_ops, num_to_string, parse_num, Op, OpCode};
