use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use fallible_iterator::FallibleIterator;

/// Distance between the parentheses of a PASV sextet, from
/// `(0,0,0,0,0,0)` to `(255,255,255,255,255,255)`.
const PASV_SPAN: std::ops::RangeInclusive<usize> = 12..=24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPort {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl HostPort {
    pub fn new(ip: Ipv4Addr, port: u16) -> HostPort {
        HostPort { ip, port }
    }

    /// Dotted form of the address, `h1.h2.h3.h4`.
    pub fn host(&self) -> String {
        self.ip.to_string()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ip), self.port)
    }

    /// Extracts the endpoint from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
    /// reply.
    pub fn from_pasv_reply(reply: &str) -> Result<HostPort, ParseHostPortError> {
        let open = reply.find('(').ok_or(ParseHostPortError::MissingParentheses)?;
        let close = reply[open..]
            .find(')')
            .map(|offset| open + offset)
            .ok_or(ParseHostPortError::MissingParentheses)?;
        let span = close - open;
        if !PASV_SPAN.contains(&span) {
            return Err(ParseHostPortError::SpanLength(span));
        }
        reply[open + 1..close].parse()
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseHostPortError {
    #[error("no parenthesized address in reply")]
    MissingParentheses,
    #[error("parenthesized address has invalid length {0}")]
    SpanLength(usize),
    #[error("expected 6 comma separated fields, found {0}")]
    FieldCount(usize),
    #[error("field `{0}` is not a number between 0 and 255")]
    BadField(String),
}

impl FromStr for HostPort {
    type Err = ParseHostPortError;

    fn from_str(s: &str) -> Result<HostPort, ParseHostPortError> {
        let fields = s.split(',').count();
        if fields != 6 {
            return Err(ParseHostPortError::FieldCount(fields));
        }
        let nums: Vec<u8> = fallible_iterator::convert(s.split(',').map(|field| {
            field
                .trim()
                .parse::<u8>()
                .map_err(|_| ParseHostPortError::BadField(field.to_owned()))
        }))
        .collect()?;
        let ip = Ipv4Addr::new(nums[0], nums[1], nums[2], nums[3]);
        let port = ((nums[4] as u16) << 8) + nums[5] as u16;
        Ok(HostPort { ip, port })
    }
}

impl Display for HostPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ip = self.ip.octets();
        let p1 = self.port >> 8;
        let p2 = self.port & 0xFF;
        write!(f, "{},{},{},{},{},{}", ip[0], ip[1], ip[2], ip[3], p1, p2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pasv_reply_parsing() {
        let host_port =
            HostPort::from_pasv_reply("227 Entering Passive Mode (192,168,1,5,117,231).").unwrap();
        assert_eq!(host_port.host(), "192.168.1.5");
        assert_eq!(host_port.port, 30182);
        assert_eq!(host_port.to_string(), "192,168,1,5,117,231");
    }

    #[test]
    fn test_pasv_reply_bounds() {
        let shortest = HostPort::from_pasv_reply("227 ok (0,0,0,0,0,0)").unwrap();
        assert_eq!(shortest.port, 0);
        let longest = HostPort::from_pasv_reply("227 ok (255,255,255,255,255,255)").unwrap();
        assert_eq!(longest.port, 65535);
    }

    #[test]
    fn test_malformed_pasv_replies() {
        assert_eq!(
            HostPort::from_pasv_reply("227 Entering Passive Mode"),
            Err(ParseHostPortError::MissingParentheses)
        );
        assert_eq!(
            HostPort::from_pasv_reply("227 Entering Passive Mode (192,168,1,5,117"),
            Err(ParseHostPortError::MissingParentheses)
        );
        assert_eq!(
            HostPort::from_pasv_reply("227 (192,168,1,5117,231)"),
            Err(ParseHostPortError::FieldCount(5))
        );
        assert_eq!(
            HostPort::from_pasv_reply("227 (1,2,3,4,5)"),
            Err(ParseHostPortError::SpanLength(10))
        );
        assert_eq!(
            HostPort::from_pasv_reply("227 (1000,168,100,100,117,231)"),
            Err(ParseHostPortError::SpanLength(25))
        );
        assert_eq!(
            HostPort::from_pasv_reply("227 (192,168,1,5,300,231)"),
            Err(ParseHostPortError::BadField("300".to_owned()))
        );
    }
}
