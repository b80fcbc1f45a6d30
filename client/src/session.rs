use crate::commands::{help_text, parse_line, Command, Line};
use crate::display::{format_event, format_hosts, format_rooms};
use crate::input::InputReader;
use crate::known_hosts;
use log::{error, info};
use peer::{Peer, PeerError, PeerEvent};
use shared::RoomId;
use std::path::PathBuf;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;

/// What a line of input resulted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Text for the user
    Print(String),
    /// A message was queued for the current room
    Sent,
    Nothing,
    Exit,
}

/// A user's chat session: one peer and the room the user is typing into
pub struct Session {
    peer: Peer,
    current_room: Option<RoomId>,
    known_hosts: PathBuf,
}

impl Session {
    pub fn new(peer: Peer, known_hosts: impl Into<PathBuf>) -> Self {
        Self {
            peer,
            current_room: None,
            known_hosts: known_hosts.into(),
        }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn current_room(&self) -> Option<RoomId> {
        self.current_room
    }

    /// Makes `room` the current room, leaving the previous one
    pub async fn switch_room(&mut self, room: RoomId) -> Result<(), PeerError> {
        if self.current_room == Some(room) {
            return Err(PeerError::AlreadyJoined(room));
        }
        if room.is_reserved() {
            return Err(PeerError::ReservedRoom(room));
        }
        if let Some(previous) = self.current_room.take() {
            self.peer.leave_room(previous).await?;
        }
        self.peer.join_room(room).await?;
        self.current_room = Some(room);
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Step {
        match parse_line(line) {
            Ok(Line::Blank) => Step::Nothing,
            Ok(Line::Message(text)) => self.send(text).await,
            Ok(Line::Command(command)) => self.handle_command(command).await,
            Err(e) => Step::Print(e.to_string()),
        }
    }

    async fn send(&mut self, text: String) -> Step {
        let Some(room) = self.current_room else {
            return Step::Print("Join a room first with /join <room>".to_string());
        };
        match self.peer.send_message(room, text).await {
            Ok(()) => Step::Sent,
            Err(e) => Step::Print(format!("Error: {}", e)),
        }
    }

    async fn handle_command(&mut self, command: Command) -> Step {
        match command {
            Command::Help => Step::Print(help_text()),

            Command::Hosts => match self.current_room {
                Some(room) => Step::Print(format_hosts(room, &self.peer.registry().search(room))),
                None => Step::Print("Not in a room".to_string()),
            },

            Command::Rooms => Step::Print(format_rooms(self.peer.registry().all_rooms())),

            Command::Join(room) => match self.switch_room(room).await {
                Ok(()) => Step::Print(format!("Now in room {}", room)),
                Err(e) => Step::Print(format!("Error: {}", e)),
            },

            Command::Leave => {
                let Some(room) = self.current_room.take() else {
                    return Step::Print("Not in a room".to_string());
                };
                match self.peer.leave_room(room).await {
                    Ok(()) => Step::Print(format!("Left room {}", room)),
                    Err(e) => Step::Print(format!("Error: {}", e)),
                }
            }

            Command::Add(host) => {
                let shown = host.to_string();
                if self.peer.seed_hosts([host]) == 1 {
                    Step::Print(format!("Added {}", shown))
                } else {
                    Step::Print(format!("{} is already known", shown))
                }
            }

            Command::Exit => Step::Exit,
        }
    }

    /// Runs until `/exit` or end of input, then saves the known hosts
    pub async fn run<R: AsyncBufRead + Unpin>(
        mut self,
        mut input: InputReader<R>,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            tokio::select! {
                line = input.next_line() => {
                    let Some(line) = line? else {
                        info!("Input closed");
                        break;
                    };
                    match self.handle_line(&line).await {
                        Step::Print(text) => println!("{}", text),
                        Step::Exit => break,
                        Step::Sent | Step::Nothing => {}
                    }
                },

                Some(event) = events.recv() => {
                    println!("{}", format_event(&event));
                },
            }
        }

        self.shutdown().await
    }

    /// Disconnects the peer and stores what it knew
    pub async fn shutdown(self) -> Result<(), Box<dyn std::error::Error>> {
        let hosts = self.peer.disconnect().await?;
        if let Err(e) = known_hosts::store(&self.known_hosts, &hosts) {
            error!("Could not save known hosts: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peer::{Host, PeerConfig};
    use std::time::Duration;
    use tokio_test::assert_ok;

    async fn session(name: &str) -> Session {
        let config = PeerConfig::default()
            .with_bind_addr("127.0.0.1:0".parse().unwrap())
            .with_ack_timeout(Duration::from_millis(20))
            .with_max_attempts(1);
        let (peer, _events) = assert_ok!(Peer::bind(config).await);
        let path = std::env::temp_dir()
            .join(format!("cal-session-{}-{}", name, std::process::id()));
        Session::new(peer, path)
    }

    #[tokio::test]
    async fn test_message_without_room() {
        let mut session = session("no-room").await;
        assert_eq!(
            session.handle_line("hello").await,
            Step::Print("Join a room first with /join <room>".to_string())
        );
        assert_ok!(session.peer.disconnect().await);
    }

    #[tokio::test]
    async fn test_join_switches_rooms() {
        let mut session = session("switch").await;

        assert_eq!(session.handle_line("/join 2").await, Step::Print("Now in room 2".to_string()));
        assert_eq!(session.handle_line("/j 3").await, Step::Print("Now in room 3".to_string()));
        assert_eq!(session.current_room(), Some(RoomId::new(3)));
        assert_eq!(session.peer().joined_rooms().await, vec![RoomId::new(3)]);

        assert!(matches!(
            session.handle_line("/join 3").await,
            Step::Print(text) if text.starts_with("Error")
        ));
        assert_eq!(session.handle_line("typing").await, Step::Sent);

        assert_eq!(session.handle_line("/leave").await, Step::Print("Left room 3".to_string()));
        assert_eq!(session.current_room(), None);
        assert_ok!(session.peer.disconnect().await);
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let mut session = session("add").await;

        assert!(matches!(
            session.handle_line("/add 10.9.9.9:4000:6").await,
            Step::Print(text) if text.starts_with("Added")
        ));
        assert!(matches!(
            session.handle_line("/add 10.9.9.9:4000:6").await,
            Step::Print(text) if text.ends_with("already known")
        ));
        assert_eq!(
            session.handle_line("/rooms").await,
            Step::Print("Populated rooms: 6".to_string())
        );

        assert_ok!(session.switch_room(RoomId::new(6)).await);
        match session.handle_line("/hosts").await {
            Step::Print(text) => assert!(text.contains("10.9.9.9:4000")),
            other => panic!("Unexpected step: {:?}", other),
        }
        assert_ok!(session.peer.disconnect().await);
    }

    #[tokio::test]
    async fn test_exit_and_shutdown_saves_hosts() {
        let mut session = session("exit").await;
        session.peer().seed_hosts([Host::new("10.1.1.1".parse().unwrap(), 7000, RoomId::new(1))]);

        assert_eq!(session.handle_line("/exit").await, Step::Exit);
        assert_eq!(session.handle_line("").await, Step::Nothing);

        let path = session.known_hosts.clone();
        assert_ok!(session.shutdown().await);
        let saved = known_hosts::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(saved.len(), 1);
    }
}
