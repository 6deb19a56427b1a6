use std::net::{Ipv4Addr, SocketAddrV4};

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_till, take_while_m_n},
    character::complete::{anychar, char},
    combinator::{eof, map, map_res, rest},
    sequence::tuple,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(super) enum Separator {
    Continued,
    Final,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) struct ReplyLine<'a> {
    pub code: u16,
    pub separator: Separator,
    pub text: &'a str,
}

fn reply_code(input: &str) -> IResult<&str, u16> {
    map_res(
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        str::parse::<u16>,
    )(input)
}

fn separator(input: &str) -> IResult<&str, Separator> {
    alt((
        map(char('-'), |_| Separator::Continued),
        map(char(' '), |_| Separator::Final),
        // some servers send a bare code without any text
        map(eof, |_| Separator::Final),
    ))(input)
}

/// Parses one line of a reply, without its line terminator.
pub(super) fn reply_line(input: &str) -> IResult<&str, ReplyLine<'_>> {
    let (input, code) = reply_code(input)?;
    let (input, separator) = separator(input)?;
    let (input, text) = rest(input)?;
    Ok((
        input,
        ReplyLine {
            code,
            separator,
            text,
        },
    ))
}

fn octet(input: &str) -> IResult<&str, u8> {
    nom::character::complete::u8(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    nom::character::complete::u16(input)
}

/// Extracts `h1,h2,h3,h4,p1,p2` from the text of a `227` reply. The
/// parentheses around the address are optional, as servers disagree on them.
pub(super) fn passive_address(input: &str) -> IResult<&str, SocketAddrV4> {
    let (input, _) = take_till(|c: char| c.is_ascii_digit())(input)?;
    let (input, (h1, _, h2, _, h3, _, h4, _, p1, _, p2)) = tuple((
        octet,
        char(','),
        octet,
        char(','),
        octet,
        char(','),
        octet,
        char(','),
        octet,
        char(','),
        octet,
    ))(input)?;
    let port = (u16::from(p1) << 8) | u16::from(p2);
    Ok((
        input,
        SocketAddrV4::new(Ipv4Addr::new(h1, h2, h3, h4), port),
    ))
}

/// Extracts the port from the text of a `229` reply, e.g. `(|||6446|)`.
pub(super) fn extended_passive_port(input: &str) -> IResult<&str, u16> {
    let (input, _) = take_till(|c: char| c == '(')(input)?;
    let (input, _) = char('(')(input)?;
    let (input, delimiter) = anychar(input)?;
    let (input, _) = char(delimiter)(input)?;
    let (input, _) = char(delimiter)(input)?;
    let (input, port) = port(input)?;
    let (input, _) = char(delimiter)(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, port))
}
