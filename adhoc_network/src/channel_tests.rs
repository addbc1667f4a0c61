use adhoc_proto::{
    agent::{self, AgentPacket, AgentStage, Info, Version},
    stage::Transitions,
};
use adhoc_utils::Message;

use super::*;

type AgentChannel = Channel<AgentPacket, Transitions<AgentStage>>;

fn channel() -> AgentChannel {
    Channel::new(agent::stages(), ChannelConfig::standard())
}

fn queue_handshake(ch: &mut AgentChannel) {
    ch.send(Version {
        uid: 0x0123_4567_89AB_CDEF,
        version: 7,
    })
    .unwrap();
    ch.send(Info {
        info: "unsupported version, please upgrade".into(),
    })
    .unwrap();
}

fn channel_with_handshake() -> AgentChannel {
    let mut ch = channel();
    queue_handshake(&mut ch);
    ch
}

fn drain(ch: &mut AgentChannel, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0; chunk];

    loop {
        let n = ch.get_bytes(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn tiny_buffers_go_through_staging() {
    let mut ch = channel();
    queue_handshake(&mut ch);

    let mut buf = [0; 3];
    assert_eq!(ch.get_bytes(&mut buf).unwrap(), 3);
    assert!(ch.tx.is_staged());
    assert_eq!(buf[0], 1);

    // the version is fully staged, the info waits for the staging buffer to drain
    assert_eq!(ch.stage(), AgentStage::VersionMatching);
    assert!(ch.transmitter().in_flight().is_none());
    assert_eq!(ch.transmitter().queued(), 1);
    assert!(!ch.transmitter().is_idle());

    assert_eq!(ch.get_bytes(&mut buf).unwrap(), 3);
    assert_eq!(ch.stage(), AgentStage::VersionMatching);
}

#[test]
fn output_does_not_depend_on_buffer_size() {
    let mut reference = channel();
    queue_handshake(&mut reference);
    let expected = drain(&mut reference, 1024);

    for chunk in [1, 2, 5, 8, 9, 10, 17, 64] {
        let mut ch = channel();
        queue_handshake(&mut ch);
        assert_eq!(drain(&mut ch, chunk), expected, "chunk size {chunk}");
        assert!(ch.transmitter().is_idle());
    }
}

#[test]
fn large_buffers_are_filled_entirely() {
    let total = drain(&mut channel_with_handshake(), 1024).len();
    let mut ch = channel_with_handshake();

    // a buffer ending in the middle of the version's uid still gets every byte
    let mut buf = vec![0; total - 1];
    assert_eq!(ch.get_bytes(&mut buf).unwrap(), total - 1);
    assert_eq!(ch.get_bytes(&mut buf).unwrap(), 1);
    assert_eq!(ch.get_bytes(&mut buf).unwrap(), 0);
}

#[test]
fn close_discards_pending_state() {
    let mut ch = channel_with_handshake();

    let mut buf = [0; 4];
    ch.get_bytes(&mut buf).unwrap();
    ch.put_bytes(&[Version::ID as u8, 0xFF]).unwrap_err();

    assert!(ch.is_closed());
    assert!(ch.transmitter().is_idle());
    assert!(ch.receiver().in_flight().is_none());
    assert!(ch.tx.cursor.is_idle());
    assert!(matches!(ch.send(Info::default()), Err(ChannelError::Closed)));
    assert!(matches!(ch.get_bytes(&mut buf), Err(ChannelError::Closed)));
}

#[derive(Debug, Default)]
struct SentCount(usize);

impl Events<AgentPacket> for SentCount {
    fn on_sent(&mut self, _: &AgentPacket) {
        self.0 += 1;
    }
}

#[test]
fn staged_packets_count_as_sent() {
    let mut ch = channel().with_events(SentCount::default());
    ch.send(Version::default()).unwrap();

    let mut buf = [0; 1];
    assert_eq!(ch.get_bytes(&mut buf).unwrap(), 1);
    assert_eq!(ch.events().0, 1);
    assert_eq!(ch.stage(), AgentStage::VersionMatching);
    assert!(ch.tx.is_staged());

    // the remaining 12 bytes trickle out without firing again
    let mut rest = 0;
    while ch.get_bytes(&mut buf).unwrap() == 1 {
        rest += 1;
    }
    assert_eq!(rest, 12);
    assert_eq!(ch.events().0, 1);
}
