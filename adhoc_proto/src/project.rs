//! A complete protocol description, as uploaded by an agent.
//!
//! [`Project`] is the only root message here; everything else is nested in it.
//! Cross references between items (a channel's hosts, a branch's target stage...)
//! are by `uid`, the position of the referenced item in its list.

use adhoc_utils::{
    Bits, CodecError, Map, Message, Progress, Reader, Step, Wire, Writer, if_present,
};
use serde::{Deserialize, Serialize};

use crate::{DOC_LEN, NAME_LEN};

/// Maximum number of hosts or channels in a project.
pub const HOSTS_LEN: usize = 255;
pub const CHANNELS_LEN: usize = 255;

/// Maximum number of packs, fields or constants in a project.
pub const ITEMS_LEN: usize = 65_000;

/// Maximum number of stages in a channel, branches in a stage, or packs in a branch.
pub const STAGES_LEN: usize = 4096;

/// Maximum number of dimensions of a multidimensional field.
pub const DIMS_LEN: usize = 32;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Identifies the generation task this upload starts.
    pub task: String,
    pub name: String,
    /// Last modification time, in milliseconds since the Unix epoch.
    pub time: u64,
    pub doc: Option<String>,
    pub hosts: Vec<Host>,
    pub packs: Vec<Pack>,
    pub fields: Vec<Field>,
    pub channels: Vec<Channel>,
    pub constants: Vec<Constant>,
}

impl Message for Project {
    const ID: i16 = 2;
    const NAME: &'static str = "Project";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
        Step::Field(5),
        Step::Field(6),
        Step::Field(7),
        Step::Field(8),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => w.put_str(&self.task, NAME_LEN),
            1 => w.put_str(&self.name, NAME_LEN),
            2 => self.time.put(w),
            3 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            4 => w.put_seq(&self.hosts, HOSTS_LEN),
            5 => w.put_seq(&self.packs, ITEMS_LEN),
            6 => w.put_seq(&self.fields, ITEMS_LEN),
            7 => w.put_seq(&self.channels, CHANNELS_LEN),
            _ => w.put_seq(&self.constants, ITEMS_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => r.get_str(&mut self.task, NAME_LEN),
            1 => r.get_str(&mut self.name, NAME_LEN),
            2 => self.time.get(r),
            3 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            4 => r.get_seq(&mut self.hosts, HOSTS_LEN),
            5 => r.get_seq(&mut self.packs, ITEMS_LEN),
            6 => r.get_seq(&mut self.fields, ITEMS_LEN),
            7 => r.get_seq(&mut self.channels, CHANNELS_LEN),
            _ => r.get_seq(&mut self.constants, ITEMS_LEN),
        }
    }
}

/// A participant of the protocol, and the languages code is generated in for it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub uid: u8,
    pub name: String,
    pub doc: Option<String>,
    /// Bit set of target languages.
    pub langs: u16,
    /// Per-pack implementation hints, keyed by pack uid. A null value means the
    /// pack is not implemented on this host.
    pub pack_impl: Map<u16, u16>,
}

impl Message for Host {
    const ID: i16 = -1;
    const NAME: &'static str = "Host";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => w.put_str(&self.name, NAME_LEN),
            2 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            3 => self.langs.put(w),
            _ => w.put_map(&self.pack_impl, ITEMS_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => r.get_str(&mut self.name, NAME_LEN),
            2 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            3 => self.langs.get(r),
            _ => r.get_map(&mut self.pack_impl, ITEMS_LEN),
        }
    }
}

/// A message type of the described protocol.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub uid: u16,
    /// Wire id of the pack.
    pub id: u16,
    pub name: String,
    pub doc: Option<String>,
    /// Uid of the enclosing pack, for nested declarations.
    pub parent: Option<u16>,
    /// Field uids, negative ones referring to fields inherited from another pack.
    pub fields: Vec<i32>,
    pub static_fields: Vec<i32>,
}

impl Message for Pack {
    const ID: i16 = -2;
    const NAME: &'static str = "Pack";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
        Step::Field(5),
        Step::Field(6),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc).with_some(&self.parent)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
        self.parent = bits.some_if(1);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => self.id.put(w),
            2 => w.put_str(&self.name, NAME_LEN),
            3 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            4 => if_present(self.parent.as_ref(), |parent| parent.put(w)),
            5 => w.put_array(&self.fields, ITEMS_LEN),
            _ => w.put_array(&self.static_fields, ITEMS_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => self.id.get(r),
            2 => r.get_str(&mut self.name, NAME_LEN),
            3 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            4 => if_present(self.parent.as_mut(), |parent| parent.get(r)),
            5 => r.get_array(&mut self.fields, ITEMS_LEN),
            _ => r.get_array(&mut self.static_fields, ITEMS_LEN),
        }
    }
}

/// A field of a pack, or a constant's type.
///
/// Flags and optional attributes span two bit groups.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub uid: i32,
    pub name: String,
    pub doc: Option<String>,
    pub nullable: bool,
    /// Maximum length of a string or collection field.
    pub length: Option<i32>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub min_dbl: Option<f64>,
    pub max_dbl: Option<f64>,
    /// Bit width of a packed integer field.
    pub bits: Option<u8>,
    /// Maximum length of a map or set field.
    pub map_set_len: Option<i32>,
    /// Value type of a map field.
    pub value_type: Option<i32>,
    pub unique: bool,
    /// Internal and external type codes.
    pub in_t: i32,
    pub ex_t: i32,
    pub dims: Vec<i32>,
}

impl Message for Field {
    const ID: i16 = -3;
    const NAME: &'static str = "Field";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
        Step::Field(5),
        Step::Field(6),
        Step::Field(7),
        Step::Field(8),
        Step::Bits(1),
        Step::Field(9),
        Step::Field(10),
        Step::Field(11),
        Step::Field(12),
        Step::Field(13),
    ];

    fn put_bits(&self, group: u8) -> Bits {
        match group {
            0 => Bits::new()
                .with(self.nullable)
                .with_some(&self.doc)
                .with_some(&self.length)
                .with_some(&self.min_value)
                .with_some(&self.max_value)
                .with_some(&self.min_dbl)
                .with_some(&self.max_dbl)
                .with_some(&self.bits),
            _ => Bits::new()
                .with_some(&self.map_set_len)
                .with_some(&self.value_type)
                .with(self.unique),
        }
    }

    fn get_bits(&mut self, group: u8, bits: Bits) {
        match group {
            0 => {
                self.nullable = bits.get(0);
                self.doc = bits.some_if(1);
                self.length = bits.some_if(2);
                self.min_value = bits.some_if(3);
                self.max_value = bits.some_if(4);
                self.min_dbl = bits.some_if(5);
                self.max_dbl = bits.some_if(6);
                self.bits = bits.some_if(7);
            }
            _ => {
                self.map_set_len = bits.some_if(0);
                self.value_type = bits.some_if(1);
                self.unique = bits.get(2);
            }
        }
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => w.put_str(&self.name, NAME_LEN),
            2 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            3 => if_present(self.length.as_ref(), |v| v.put(w)),
            4 => if_present(self.min_value.as_ref(), |v| v.put(w)),
            5 => if_present(self.max_value.as_ref(), |v| v.put(w)),
            6 => if_present(self.min_dbl.as_ref(), |v| v.put(w)),
            7 => if_present(self.max_dbl.as_ref(), |v| v.put(w)),
            8 => if_present(self.bits.as_ref(), |v| v.put(w)),
            9 => if_present(self.map_set_len.as_ref(), |v| v.put(w)),
            10 => if_present(self.value_type.as_ref(), |v| v.put(w)),
            11 => self.in_t.put(w),
            12 => self.ex_t.put(w),
            _ => w.put_array(&self.dims, DIMS_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => r.get_str(&mut self.name, NAME_LEN),
            2 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            3 => if_present(self.length.as_mut(), |v| v.get(r)),
            4 => if_present(self.min_value.as_mut(), |v| v.get(r)),
            5 => if_present(self.max_value.as_mut(), |v| v.get(r)),
            6 => if_present(self.min_dbl.as_mut(), |v| v.get(r)),
            7 => if_present(self.max_dbl.as_mut(), |v| v.get(r)),
            8 => if_present(self.bits.as_mut(), |v| v.get(r)),
            9 => if_present(self.map_set_len.as_mut(), |v| v.get(r)),
            10 => if_present(self.value_type.as_mut(), |v| v.get(r)),
            11 => self.in_t.get(r),
            12 => self.ex_t.get(r),
            _ => r.get_array(&mut self.dims, DIMS_LEN),
        }
    }
}

/// A communication channel between two hosts, with its stage graph.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub uid: u8,
    pub name: String,
    pub doc: Option<String>,
    /// Uids of the hosts on the left and right ends.
    pub host_l: u8,
    pub host_r: u8,
    pub stages: Vec<Stage>,
}

impl Message for Channel {
    const ID: i16 = -4;
    const NAME: &'static str = "Channel";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
        Step::Field(5),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => w.put_str(&self.name, NAME_LEN),
            2 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            3 => self.host_l.put(w),
            4 => self.host_r.put(w),
            _ => w.put_seq(&self.stages, STAGES_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => r.get_str(&mut self.name, NAME_LEN),
            2 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            3 => self.host_l.get(r),
            4 => self.host_r.get(r),
            _ => r.get_seq(&mut self.stages, STAGES_LEN),
        }
    }
}

/// A stage of a channel, and the branches leaving it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub uid: u16,
    pub name: String,
    pub doc: Option<String>,
    /// Timeout in seconds.
    pub timeout: Option<u16>,
    pub branches: Vec<Branch>,
}

impl Message for Stage {
    const ID: i16 = -5;
    const NAME: &'static str = "Stage";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc).with_some(&self.timeout)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
        self.timeout = bits.some_if(1);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => w.put_str(&self.name, NAME_LEN),
            2 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            3 => if_present(self.timeout.as_ref(), |t| t.put(w)),
            _ => w.put_seq(&self.branches, STAGES_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => r.get_str(&mut self.name, NAME_LEN),
            2 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            3 => if_present(self.timeout.as_mut(), |t| t.get(r)),
            _ => r.get_seq(&mut self.branches, STAGES_LEN),
        }
    }
}

/// A set of packs that may be sent in a stage, and the stage they lead to.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub uid: u16,
    pub doc: Option<String>,
    /// `None` to stay in the current stage.
    pub goto_stage: Option<u16>,
    /// Uids of the packs.
    pub packs: Vec<u16>,
}

impl Message for Branch {
    const ID: i16 = -6;
    const NAME: &'static str = "Branch";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.doc).with_some(&self.goto_stage)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
        self.goto_stage = bits.some_if(1);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            1 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            2 => if_present(self.goto_stage.as_ref(), |s| s.put(w)),
            _ => w.put_array(&self.packs, STAGES_LEN),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            1 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            2 => if_present(self.goto_stage.as_mut(), |s| s.get(r)),
            _ => r.get_array(&mut self.packs, STAGES_LEN),
        }
    }
}

/// A named constant. At most one of the values is set.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub doc: Option<String>,
    pub int_value: Option<i64>,
    pub dbl_value: Option<f64>,
    pub str_value: Option<String>,
}

impl Message for Constant {
    const ID: i16 = -7;
    const NAME: &'static str = "Constant";
    const LAYOUT: &'static [Step] = &[
        Step::Bits(0),
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
    ];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new()
            .with_some(&self.doc)
            .with_some(&self.int_value)
            .with_some(&self.dbl_value)
            .with_some(&self.str_value)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.doc = bits.some_if(0);
        self.int_value = bits.some_if(1);
        self.dbl_value = bits.some_if(2);
        self.str_value = bits.some_if(3);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => w.put_str(&self.name, NAME_LEN),
            1 => if_present(self.doc.as_ref(), |doc| w.put_str(doc, DOC_LEN)),
            2 => if_present(self.int_value.as_ref(), |v| v.put(w)),
            3 => if_present(self.dbl_value.as_ref(), |v| v.put(w)),
            _ => if_present(self.str_value.as_ref(), |v| w.put_str(v, DOC_LEN)),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => r.get_str(&mut self.name, NAME_LEN),
            1 => if_present(self.doc.as_mut(), |doc| r.get_str(doc, DOC_LEN)),
            2 => if_present(self.int_value.as_mut(), |v| v.get(r)),
            3 => if_present(self.dbl_value.as_mut(), |v| v.get(r)),
            _ => if_present(self.str_value.as_mut(), |v| r.get_str(v, DOC_LEN)),
        }
    }
}
