use std::fmt::Display;

use derive_getters::Getters;

/// Three digit FTP reply code as defined in RFC 959 section 4.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ReplyCode(u16);

impl ReplyCode {
    pub const SERVICE_READY_SOON: Self = Self(120);
    pub const COMMAND_OK: Self = Self(200);
    pub const SERVICE_READY: Self = Self(220);
    pub const CLOSING_CONTROL: Self = Self(221);
    pub const PASSIVE_MODE: Self = Self(227);
    pub const EXTENDED_PASSIVE_MODE: Self = Self(229);
    pub const LOGGED_IN: Self = Self(230);
    pub const AUTH_ACCEPTED: Self = Self(234);
    pub const NEED_PASSWORD: Self = Self(331);
    pub const FILE_BUSY: Self = Self(450);
    pub const NOT_LOGGED_IN: Self = Self(530);
    pub const NEED_ACCOUNT_FOR_STORING: Self = Self(532);
    pub const FILE_UNAVAILABLE: Self = Self(550);
    pub const NAME_NOT_ALLOWED: Self = Self(553);

    pub fn new(code: u16) -> Option<Self> {
        (100..600).contains(&code).then_some(Self(code))
    }

    pub fn is_preliminary(self) -> bool {
        self.0 / 100 == 1
    }

    pub fn is_completion(self) -> bool {
        self.0 / 100 == 2
    }

    pub fn is_transient_negative(self) -> bool {
        self.0 / 100 == 4
    }

    pub fn is_permanent_negative(self) -> bool {
        self.0 / 100 == 5
    }

    pub fn is_negative(self) -> bool {
        self.is_transient_negative() || self.is_permanent_negative()
    }
}

impl Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ReplyCode> for u16 {
    fn from(value: ReplyCode) -> Self {
        value.0
    }
}

/// A complete server reply. Multi-line replies keep every line, the first
/// and last without their code prefix.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
pub struct Reply {
    #[getter(skip)]
    code: ReplyCode,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    #[cfg(test)]
    pub fn single(code: ReplyCode, text: &str) -> Self {
        Self::new(code, vec![text.to_string()])
    }

    pub fn code(&self) -> ReplyCode {
        self.code
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map_or("", String::as_str)
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" "))
    }
}
