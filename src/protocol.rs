//! Line protocol parser and response generator.
//!
//! One request per connection, one response per request:
//!
//! ```text
//! Request:  CREATE|<argument>\n     Response: OK|CREATE\n
//! Request:  DELETE|<argument>\n     Response: OK|DELETE\n
//! Request:  MARK_READ|<argument>\n  Response: OK|MARK_READ\n
//! Request:  SHAKE\n                 Response: OK|SHAKE\n
//! Request:  anything else           Response: ERROR|UNKNOWN\n
//! ```
//!
//! Matching is a case-sensitive prefix match, tried in the order above.
//! Arguments are opaque and are not validated.

use bytes::Bytes;

use crate::events::ServerEvents;

/// The supported commands, without their arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Delete,
    MarkRead,
    Shake,
}

impl CommandKind {
    /// Wire name of the command.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Create => "CREATE",
            CommandKind::Delete => "DELETE",
            CommandKind::MarkRead => "MARK_READ",
            CommandKind::Shake => "SHAKE",
        }
    }

    /// Prefix that selects this command. SHAKE takes no delimiter.
    fn prefix(self) -> &'static [u8] {
        match self {
            CommandKind::Create => b"CREATE|",
            CommandKind::Delete => b"DELETE|",
            CommandKind::MarkRead => b"MARK_READ|",
            CommandKind::Shake => b"SHAKE",
        }
    }

    /// Match order. First hit wins.
    const ALL: [CommandKind; 4] = [
        CommandKind::Create,
        CommandKind::Delete,
        CommandKind::MarkRead,
        CommandKind::Shake,
    ];
}

/// Parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Create an entry; argument is everything after `CREATE|`
    Create(&'a [u8]),
    /// Delete an entry by id
    Delete(&'a [u8]),
    /// Mark an entry read by id
    MarkRead(&'a [u8]),
    /// Mark everything read
    Shake,
    /// Unrecognized line, kept verbatim
    Unknown(&'a [u8]),
}

impl<'a> Command<'a> {
    /// Parse an already-normalized line.
    pub fn parse(line: &'a [u8]) -> Command<'a> {
        for kind in CommandKind::ALL {
            if let Some(argument) = line.strip_prefix(kind.prefix()) {
                return match kind {
                    CommandKind::Create => Command::Create(argument),
                    CommandKind::Delete => Command::Delete(argument),
                    CommandKind::MarkRead => Command::MarkRead(argument),
                    CommandKind::Shake => Command::Shake,
                };
            }
        }
        Command::Unknown(line)
    }

    /// The command kind, or `None` for unknown input.
    pub fn kind(&self) -> Option<CommandKind> {
        match self {
            Command::Create(_) => Some(CommandKind::Create),
            Command::Delete(_) => Some(CommandKind::Delete),
            Command::MarkRead(_) => Some(CommandKind::MarkRead),
            Command::Shake => Some(CommandKind::Shake),
            Command::Unknown(_) => None,
        }
    }

    /// The opaque argument, empty for SHAKE and unknown input.
    pub fn argument(&self) -> &'a [u8] {
        match self {
            Command::Create(arg) | Command::Delete(arg) | Command::MarkRead(arg) => *arg,
            Command::Shake | Command::Unknown(_) => b"",
        }
    }
}

/// Response line written back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok(CommandKind),
    Unknown,
}

impl Response {
    /// Wire form, including the trailing line feed.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Response::Ok(CommandKind::Create) => b"OK|CREATE\n",
            Response::Ok(CommandKind::Delete) => b"OK|DELETE\n",
            Response::Ok(CommandKind::MarkRead) => b"OK|MARK_READ\n",
            Response::Ok(CommandKind::Shake) => b"OK|SHAKE\n",
            Response::Unknown => b"ERROR|UNKNOWN\n",
        }
    }

    pub fn to_bytes(self) -> Bytes {
        Bytes::from_static(self.as_bytes())
    }
}

/// Cut the input at the first `\n` or `\r`. Anything after is ignored.
pub fn first_line(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|&b| b == b'\n' || b == b'\r') {
        Some(end) => &raw[..end],
        None => raw,
    }
}

/// Normalize, parse and answer one request.
pub fn dispatch(raw: &[u8], events: &dyn ServerEvents) -> Response {
    let line = first_line(raw);
    events.received(line);

    let command = Command::parse(line);
    match command.kind() {
        Some(kind) => {
            events.command_handled(kind, command.argument());
            Response::Ok(kind)
        }
        None => {
            events.unknown_command(line);
            Response::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::recording::{Event, RecordingEvents};

    fn respond(raw: &[u8]) -> &'static [u8] {
        dispatch(raw, &RecordingEvents::default()).as_bytes()
    }

    #[test]
    fn test_supported_commands() {
        assert_eq!(respond(b"CREATE|42\n"), b"OK|CREATE\n");
        assert_eq!(respond(b"DELETE|7\n"), b"OK|DELETE\n");
        assert_eq!(respond(b"MARK_READ|3\n"), b"OK|MARK_READ\n");
        assert_eq!(respond(b"SHAKE\n"), b"OK|SHAKE\n");
    }

    #[test]
    fn test_unknown_commands() {
        assert_eq!(respond(b"PING\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b"create|1\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b"CREATE 1\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b"DELETE\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b" SHAKE\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b"\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b""), b"ERROR|UNKNOWN\n");
    }

    #[test]
    fn test_shake_needs_no_delimiter() {
        assert_eq!(Command::parse(b"SHAKE"), Command::Shake);
        assert_eq!(Command::parse(b"SHAKE|extra"), Command::Shake);
        assert_eq!(Command::parse(b"SHAKEN"), Command::Shake);
    }

    #[test]
    fn test_argument_is_opaque() {
        let line = b"CREATE|id-1|Title|Body text";
        assert_eq!(Command::parse(line), Command::Create(b"id-1|Title|Body text"));
        assert_eq!(Command::parse(b"CREATE|"), Command::Create(b""));
        assert_eq!(Command::parse(b"MARK_READ|\xff\xfe"), Command::MarkRead(b"\xff\xfe"));
    }

    #[test]
    fn test_only_first_line_counts() {
        assert_eq!(respond(b"SHAKE\nPING\n"), b"OK|SHAKE\n");
        assert_eq!(respond(b"PING\nSHAKE\n"), b"ERROR|UNKNOWN\n");
        assert_eq!(respond(b"DELETE|9\r\n"), b"OK|DELETE\n");
        assert_eq!(first_line(b"CREATE|1\rDELETE|2\n"), b"CREATE|1");
        assert_eq!(first_line(b"no terminator"), b"no terminator");
    }

    #[test]
    fn test_events_reported() {
        let events = RecordingEvents::default();
        dispatch(b"MARK_READ|3\n", &events);
        dispatch(b"PING\r\n", &events);

        assert_eq!(
            events.events(),
            vec![
                Event::Received(b"MARK_READ|3".to_vec()),
                Event::Handled(CommandKind::MarkRead, b"3".to_vec()),
                Event::Received(b"PING".to_vec()),
                Event::Unknown(b"PING".to_vec()),
            ]
        );
    }

    #[test]
    fn test_response_bytes() {
        assert_eq!(Response::Unknown.to_bytes(), Bytes::from_static(b"ERROR|UNKNOWN\n"));
        for kind in CommandKind::ALL {
            let expected = format!("OK|{}\n", kind.name());
            assert_eq!(Response::Ok(kind).as_bytes(), expected.as_bytes());
        }
    }
}
