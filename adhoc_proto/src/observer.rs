//! Messages exchanged between an observer and the server.
//!
//! An observer shares the agent's handshake ([`Version`], then [`Invitation`] or
//! [`Info`]), then receives projects to display and sends back the user's layout.

use adhoc_utils::{Bits, CodecError, Map, Message, Progress, Reader, Step, Wire, Writer, packets};
use serde::{Deserialize, Serialize};

use crate::{
    NAME_LEN,
    agent::{Info, Invitation, Version},
    project::{CHANNELS_LEN, HOSTS_LEN, ITEMS_LEN, Project},
    stage::Transitions,
};

/// Asks the server for the project of a task, or for the latest one.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Show {
    pub task: Option<String>,
}

impl Message for Show {
    const ID: i16 = 7;
    const NAME: &'static str = "Show";
    const LAYOUT: &'static [Step] = &[Step::Bits(0), Step::Field(0)];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new().with_some(&self.task)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.task = bits.some_if(0);
    }

    fn put_field(&self, _: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        adhoc_utils::if_present(self.task.as_ref(), |task| w.put_str(task, NAME_LEN))
    }

    fn get_field(&mut self, _: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        adhoc_utils::if_present(self.task.as_mut(), |task| r.get_str(task, NAME_LEN))
    }
}

/// A diagram position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xy {
    pub x: i32,
    pub y: i32,
}

impl Message for Xy {
    const ID: i16 = -8;
    const NAME: &'static str = "Xy";
    const LAYOUT: &'static [Step] = &[Step::Field(0), Step::Field(1)];

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.x.put(w),
            _ => self.y.put(w),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.x.get(r),
            _ => self.y.get(r),
        }
    }
}

/// The visible part of the diagram.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub x: i32,
    pub y: i32,
    pub zoom: f32,
}

impl Message for View {
    const ID: i16 = -9;
    const NAME: &'static str = "View";
    const LAYOUT: &'static [Step] = &[Step::Field(0), Step::Field(1), Step::Field(2)];

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.x.put(w),
            1 => self.y.put(w),
            _ => self.zoom.put(w),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.x.get(r),
            1 => self.y.get(r),
            _ => self.zoom.get(r),
        }
    }
}

/// Where the user placed each item of the diagram, keyed by item uid.
///
/// A null position means the item is hidden.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub view: View,
    pub hosts: Map<u8, Xy>,
    pub packs: Map<u16, Xy>,
    pub channels: Map<u8, Xy>,
    /// Position of the splitter between the diagram and the documentation panel,
    /// as a fraction of the window width.
    pub splitter: f32,
}

impl Message for Layout {
    const ID: i16 = 8;
    const NAME: &'static str = "Layout";
    const LAYOUT: &'static [Step] = &[
        Step::Field(0),
        Step::Field(1),
        Step::Field(2),
        Step::Field(3),
        Step::Field(4),
    ];

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.view.put(w),
            1 => w.put_map(&self.hosts, HOSTS_LEN),
            2 => w.put_map(&self.packs, ITEMS_LEN),
            3 => w.put_map(&self.channels, CHANNELS_LEN),
            _ => self.splitter.put(w),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.view.get(r),
            1 => r.get_map(&mut self.hosts, HOSTS_LEN),
            2 => r.get_map(&mut self.packs, ITEMS_LEN),
            3 => r.get_map(&mut self.channels, CHANNELS_LEN),
            _ => self.splitter.get(r),
        }
    }
}

packets! {
    /// Every message an observer channel carries, in either direction.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum ObserverPacket {
        Version,
        Invitation,
        Info,
        Project,
        Show,
        Layout,
    }
}

/// Stages of an observer conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverStage {
    Start,
    VersionMatching,
    Ready,
    Exit,
}

/// The observer conversation: the agent handshake, then any number of
/// [`Show`], [`Project`] and [`Layout`] messages.
pub fn stages() -> Transitions<ObserverStage> {
    use ObserverStage::*;

    Transitions::new(Start)
        .with(Start, Version::ID as u16, VersionMatching)
        .with(VersionMatching, Info::ID as u16, Exit)
        .with(VersionMatching, Invitation::ID as u16, Ready)
        .with(Ready, Show::ID as u16, Ready)
        .with(Ready, Project::ID as u16, Ready)
        .with(Ready, Layout::ID as u16, Ready)
        .with(Ready, Info::ID as u16, Exit)
}
