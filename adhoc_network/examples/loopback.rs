//! An agent uploading a project to a server over a local TCP connection.

use std::{
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};

use adhoc_network::{
    Channel, ChannelConfig, ChannelError,
    adhoc_proto::{
        Project,
        agent::{self, AgentPacket, AgentStage, Invitation, TaskResult, Version},
    },
};

const TIMEOUT: Duration = Duration::from_millis(250);

fn serve(stream: TcpStream) -> Result<(), ChannelError> {
    stream.set_read_timeout(Some(TIMEOUT))?;
    let mut ch: Channel<AgentPacket, _> = Channel::new(agent::stages(), ChannelConfig::standard());

    while ch.stage() != AgentStage::Exit && !ch.is_closed() {
        ch.read_from(&stream)?;

        while let Some(packet) = ch.recv() {
            match packet {
                AgentPacket::Version(v) => {
                    println!("server: agent {:#x} speaks version {}", v.uid, v.version);
                    ch.send(Invitation)?;
                }
                AgentPacket::Project(p) => {
                    println!("server: building {} ({} hosts)", p.name, p.hosts.len());
                    ch.send(TaskResult {
                        task: Some(p.task),
                        result: None,
                        info: Some("nothing to generate".into()),
                    })?;
                }
                other => println!("server: ignoring {other:?}"),
            }
        }

        if !ch.is_closed() {
            ch.write_to(&stream)?;
        }
    }

    println!("server: conversation over in stage {:?}", ch.stage());
    Ok(())
}

fn main() -> Result<(), ChannelError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = thread::spawn(move || -> Result<(), ChannelError> {
        let (stream, _) = listener.accept()?;
        serve(stream)
    });

    let stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(TIMEOUT))?;

    let mut ch: Channel<AgentPacket, _> = Channel::new(agent::stages(), ChannelConfig::standard());
    ch.send(Version {
        uid: 0xADC0DE,
        version: 1,
    })?;
    ch.write_to(&stream)?;

    loop {
        ch.read_from(&stream)?;

        while let Some(packet) = ch.recv() {
            match packet {
                AgentPacket::Invitation(_) => {
                    ch.send(Project {
                        task: "demo".into(),
                        name: "Loopback".into(),
                        ..Default::default()
                    })?;
                }
                AgentPacket::TaskResult(r) => {
                    println!("agent: task {:?} done: {:?}", r.task, r.info);
                    ch.close();
                }
                other => println!("agent: ignoring {other:?}"),
            }
        }

        if ch.is_closed() {
            break;
        }

        ch.write_to(&stream)?;
    }

    // dropping the stream ends the server's conversation
    drop(stream);

    match server.join() {
        Ok(res) => res,
        Err(_) => {
            eprintln!("server thread panicked");
            Ok(())
        }
    }
}
