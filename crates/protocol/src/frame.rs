use serde::{Deserialize, Serialize};

use crate::{
    location::PUBLIC_UID,
    message::{Message, MsgType},
};

/// Bytes the journal engine spends on each frame header.
pub const FRAME_HEADER_LENGTH: u32 = 32;

/// One journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub source: u32,
    /// `PUBLIC_UID` for frames on the public stream.
    pub dest: u32,
    pub gen_time: i64,
    pub trigger_time: i64,
    /// Total frame length, header included.
    pub length: u32,
    pub data: Message,
}

impl Frame {
    pub fn new(source: u32, dest: u32, gen_time: i64, data: Message) -> Self {
        let length = FRAME_HEADER_LENGTH + data.encoded_len() as u32;
        Self {
            source,
            dest,
            gen_time,
            trigger_time: gen_time,
            length,
            data,
        }
    }

    pub fn with_trigger_time(mut self, trigger_time: i64) -> Self {
        self.trigger_time = trigger_time;
        self
    }

    /// Override the length the engine reports for this frame.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn msg_type(&self) -> MsgType {
        self.data.msg_type()
    }

    /// The location this frame's activity is credited to: the destination if
    /// it has one, otherwise the writer.
    pub fn attributed_uid(&self) -> u32 {
        if self.dest == PUBLIC_UID {
            self.source
        } else {
            self.dest
        }
    }
}
