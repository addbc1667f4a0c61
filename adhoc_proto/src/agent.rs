//! Messages exchanged between an agent and the server.

use adhoc_utils::{
    Bits, CodecError, Message, Progress, Reader, Step, Wire, Writer, if_present, packets,
};
use serde::{Deserialize, Serialize};

use crate::{DOC_LEN, NAME_LEN, project::Project, stage::Transitions};

/// Maximum size of generated code sent back in a [`TaskResult`].
pub const RESULT_LEN: usize = 30_000_000;

/// First message of an agent, identifying it and the protocol version it speaks.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub uid: u64,
    pub version: u32,
}

impl Message for Version {
    const ID: i16 = 1;
    const NAME: &'static str = "Version";
    const LAYOUT: &'static [Step] = &[Step::Field(0), Step::Field(1)];

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.put(w),
            _ => self.version.put(w),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => self.uid.get(r),
            _ => self.version.get(r),
        }
    }
}

/// Asks for the result of a task started earlier by a [`Project`] upload.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestResult {
    pub task: String,
}

impl Message for RequestResult {
    const ID: i16 = 3;
    const NAME: &'static str = "RequestResult";
    const LAYOUT: &'static [Step] = &[Step::Field(0)];

    fn put_field(&self, _: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        w.put_str(&self.task, NAME_LEN)
    }

    fn get_field(&mut self, _: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        r.get_str(&mut self.task, NAME_LEN)
    }
}

/// The outcome of a task: generated code, a diagnostic, or both.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: Option<String>,
    /// Archive of the generated sources.
    pub result: Option<Vec<u8>>,
    pub info: Option<String>,
}

impl Message for TaskResult {
    const ID: i16 = 4;
    const NAME: &'static str = "TaskResult";
    const LAYOUT: &'static [Step] = &[Step::Bits(0), Step::Field(0), Step::Field(1), Step::Field(2)];

    fn put_bits(&self, _: u8) -> Bits {
        Bits::new()
            .with_some(&self.task)
            .with_some(&self.result)
            .with_some(&self.info)
    }

    fn get_bits(&mut self, _: u8, bits: Bits) {
        self.task = bits.some_if(0);
        self.result = bits.some_if(1);
        self.info = bits.some_if(2);
    }

    fn put_field(&self, field: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => if_present(self.task.as_ref(), |task| w.put_str(task, NAME_LEN)),
            1 => if_present(self.result.as_ref(), |result| w.put_bytes(result, RESULT_LEN)),
            _ => if_present(self.info.as_ref(), |info| w.put_str(info, DOC_LEN)),
        }
    }

    fn get_field(&mut self, field: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        match field {
            0 => if_present(self.task.as_mut(), |task| r.get_str(task, NAME_LEN)),
            1 => if_present(self.result.as_mut(), |result| r.get_bytes(result, RESULT_LEN)),
            _ => if_present(self.info.as_mut(), |info| r.get_str(info, DOC_LEN)),
        }
    }
}

/// A human-readable notice from the server. Ends the conversation when it answers
/// a [`Version`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Info {
    pub info: String,
}

impl Message for Info {
    const ID: i16 = 5;
    const NAME: &'static str = "Info";
    const LAYOUT: &'static [Step] = &[Step::Field(0)];

    fn put_field(&self, _: u8, w: &mut Writer<'_>) -> Result<Progress, CodecError> {
        w.put_str(&self.info, DOC_LEN)
    }

    fn get_field(&mut self, _: u8, r: &mut Reader<'_>) -> Result<Progress, CodecError> {
        r.get_str(&mut self.info, DOC_LEN)
    }
}

/// Accepts an agent's [`Version`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invitation;

impl Message for Invitation {
    const ID: i16 = 6;
    const NAME: &'static str = "Invitation";
    const LAYOUT: &'static [Step] = &[];

    fn put_field(&self, _: u8, _: &mut Writer<'_>) -> Result<Progress, CodecError> {
        Ok(Progress::Done)
    }

    fn get_field(&mut self, _: u8, _: &mut Reader<'_>) -> Result<Progress, CodecError> {
        Ok(Progress::Done)
    }
}

packets! {
    /// Every message an agent channel carries, in either direction.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum AgentPacket {
        Version,
        Project,
        RequestResult,
        TaskResult,
        Info,
        Invitation,
    }
}

/// Stages of an agent conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStage {
    Start,
    VersionMatching,
    Ready,
    Waiting,
    Exit,
}

/// The agent conversation:
///
/// ```text
/// Start --Version--> VersionMatching --Invitation--> Ready --Project/RequestResult--> Waiting
///                                    \--Info--> Exit           Ready <--TaskResult--/   \--Info--> Exit
/// ```
pub fn stages() -> Transitions<AgentStage> {
    use AgentStage::*;

    Transitions::new(Start)
        .with(Start, Version::ID as u16, VersionMatching)
        .with(VersionMatching, Info::ID as u16, Exit)
        .with(VersionMatching, Invitation::ID as u16, Ready)
        .with(Ready, Project::ID as u16, Waiting)
        .with(Ready, RequestResult::ID as u16, Waiting)
        .with(Waiting, TaskResult::ID as u16, Ready)
        .with(Waiting, Info::ID as u16, Exit)
}
