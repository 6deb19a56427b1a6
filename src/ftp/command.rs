use std::fmt::Display;

/// Commands the harvester issues on the control connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    AuthTls,
    ProtectionBufferSize,
    ProtectPrivate,
    TypeImage,
    Passive,
    ExtendedPassive,
    ChangeDir(String),
    NameList,
    Retrieve(Vec<u8>),
    Delete(Vec<u8>),
    Quit,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::User(_) => "USER",
            Command::Pass(_) => "PASS",
            Command::AuthTls => "AUTH",
            Command::ProtectionBufferSize => "PBSZ",
            Command::ProtectPrivate => "PROT",
            Command::TypeImage => "TYPE",
            Command::Passive => "PASV",
            Command::ExtendedPassive => "EPSV",
            Command::ChangeDir(_) => "CWD",
            Command::NameList => "NLST",
            Command::Retrieve(_) => "RETR",
            Command::Delete(_) => "DELE",
            Command::Quit => "QUIT",
        }
    }

    /// Raw argument bytes. File names are sent exactly as the server listed
    /// them, which is why this is not a `str`.
    pub fn argument(&self) -> Option<&[u8]> {
        match self {
            Command::User(arg) | Command::Pass(arg) | Command::ChangeDir(arg) => {
                Some(arg.as_bytes())
            }
            Command::Retrieve(name) | Command::Delete(name) => Some(name),
            Command::AuthTls => Some(b"TLS"),
            Command::ProtectionBufferSize => Some(b"0"),
            Command::ProtectPrivate => Some(b"P"),
            Command::TypeImage => Some(b"I"),
            Command::Passive | Command::ExtendedPassive | Command::NameList | Command::Quit => {
                None
            }
        }
    }

    /// A line break inside an argument would let it smuggle in a second
    /// command.
    pub fn is_injection_safe(&self) -> bool {
        self.argument()
            .is_none_or(|argument| !argument.iter().any(|b| matches!(b, b'\r' | b'\n')))
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Pass(_) => write!(f, "PASS <password>"),
            _ => {
                write!(f, "{}", self.verb())?;
                if let Some(argument) = self.argument() {
                    write!(f, " {}", argument.escape_ascii())?;
                }
                Ok(())
            }
        }
    }
}
