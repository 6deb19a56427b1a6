use bytes::{BufMut as _, BytesMut};
use nom::Finish as _;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::ProtocolError,
    ftp::{
        command::Command,
        parser::{Separator, reply_line},
        reply::{Reply, ReplyCode},
    },
};

// RFC 959 does not limit reply lines; this only guards against a peer that
// never sends a line break.
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Frames the control connection into complete [`Reply`]s and encodes
/// [`Command`]s as CRLF terminated lines.
#[derive(Debug, Default)]
pub struct FtpCodec {
    pending: Option<(ReplyCode, Vec<String>)>,
}

impl Decoder for FtpCodec {
    type Item = Reply;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(ProtocolError::MalformedReply(
                        "reply line exceeds maximum length".to_string(),
                    ));
                }
                return Ok(None);
            };
            let raw_line = src.split_to(newline + 1);
            let decoded = String::from_utf8_lossy(&raw_line);
            let line = decoded.trim_end_matches(['\r', '\n']);

            match self.pending.take() {
                None => {
                    let (_, parsed) = reply_line(line)
                        .finish()
                        .map_err(|_| ProtocolError::MalformedReply(line.to_string()))?;
                    let code = ReplyCode::new(parsed.code)
                        .ok_or_else(|| ProtocolError::MalformedReply(line.to_string()))?;
                    let lines = vec![parsed.text.to_string()];
                    match parsed.separator {
                        Separator::Final => return Ok(Some(Reply::new(code, lines))),
                        Separator::Continued => self.pending = Some((code, lines)),
                    }
                }
                Some((code, mut lines)) => match reply_line(line).finish() {
                    Ok((_, parsed))
                        if parsed.code == u16::from(code)
                            && parsed.separator == Separator::Final =>
                    {
                        lines.push(parsed.text.to_string());
                        return Ok(Some(Reply::new(code, lines)));
                    }
                    _ => {
                        lines.push(line.to_string());
                        self.pending = Some((code, lines));
                    }
                },
            }
        }
    }
}

impl Encoder<&Command> for FtpCodec {
    type Error = ProtocolError;

    fn encode(&mut self, command: &Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if !command.is_injection_safe() {
            return Err(ProtocolError::IllegalArgument(command.to_string()));
        }
        let verb = command.verb();
        let argument = command.argument();
        dst.reserve(verb.len() + argument.map_or(0, |a| a.len() + 1) + 2);
        dst.put_slice(verb.as_bytes());
        if let Some(argument) = argument {
            dst.put_u8(b' ');
            dst.put_slice(argument);
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
